use std::io::Read;

use crate::error::WireError;
use crate::exact::ExactReader;

/// Stream prefix for format version 1: ASCII `"rbd diff v1\n"`.
///
/// Stored as raw bytes and compared byte-for-byte. There is no version
/// negotiation, so `"rbd diff v2\n"` is just as wrong as garbage.
pub const RBD_DIFF_MAGIC: [u8; MAGIC_LEN] = *b"rbd diff v1\n";

/// Length of the magic prefix in bytes.
pub const MAGIC_LEN: usize = 12;

/// Read the 12-byte prefix and check it against [`RBD_DIFF_MAGIC`].
///
/// # Errors
///
/// - [`WireError::UnexpectedEof`] if the stream is shorter than 12 bytes.
/// - [`WireError::InvalidMagic`] if the bytes differ in any position.
pub fn read_magic<R: Read>(reader: &mut ExactReader<R>) -> Result<(), WireError> {
    let mut found = [0u8; MAGIC_LEN];
    reader.read_exact_into(&mut found)?;

    if found != RBD_DIFF_MAGIC {
        return Err(WireError::InvalidMagic { found });
    }

    Ok(())
}
