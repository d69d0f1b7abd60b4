//! Little-endian integer fields.
//!
//! Every numeric field in the diff format is a *signed* little-endian
//! integer. The decoders here only reassemble the bytes; whether a
//! negative value is acceptable is up to the caller.

use std::io::Read;

use crate::error::WireError;
use crate::exact::ExactReader;

impl<R: Read> ExactReader<R> {
    /// Decode a 4-byte signed little-endian integer.
    ///
    /// # Errors
    ///
    /// Propagates [`WireError`] from the underlying exact read.
    pub fn read_i32_le(&mut self) -> Result<i32, WireError> {
        let mut buf = [0u8; 4];
        self.read_exact_into(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Decode an 8-byte signed little-endian integer.
    ///
    /// # Errors
    ///
    /// Propagates [`WireError`] from the underlying exact read.
    pub fn read_i64_le(&mut self) -> Result<i64, WireError> {
        let mut buf = [0u8; 8];
        self.read_exact_into(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_little_endian_order() {
        let mut r = ExactReader::new(Cursor::new(vec![0x01, 0x02, 0x03, 0x04]));
        assert_eq!(r.read_i32_le().unwrap(), 0x0403_0201);
    }

    #[test]
    fn negative_values_pass_through() {
        let mut bytes = (-1i32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&i64::MIN.to_le_bytes());
        let mut r = ExactReader::new(Cursor::new(bytes));
        assert_eq!(r.read_i32_le().unwrap(), -1);
        assert_eq!(r.read_i64_le().unwrap(), i64::MIN);
        assert_eq!(r.position(), 12);
    }

    #[test]
    fn truncated_field_is_eof() {
        let mut r = ExactReader::new(Cursor::new(vec![0u8; 5]));
        let err = r.read_i64_le().unwrap_err();
        assert!(matches!(
            err,
            WireError::UnexpectedEof {
                offset: 0,
                needed: 8,
                got: 5
            }
        ));
    }
}
