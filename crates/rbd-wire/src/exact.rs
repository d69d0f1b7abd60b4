use std::io::{ErrorKind, Read};

use crate::error::WireError;

/// Size of the scratch buffer used by [`ExactReader::discard`].
const DISCARD_BUF_SIZE: usize = 8 * 1024;

/// A forward-only reader that hands out *exactly* the number of bytes
/// asked for, or fails.
///
/// The diff stream cannot be seeked, so every field is pulled through this
/// wrapper. It also counts consumed bytes so errors can point at the
/// stream offset where things went wrong.
///
/// ```text
///   read_exact_into(buf)
///     ├── Ok(n > 0)          → keep filling
///     ├── Ok(0)              → UnexpectedEof { offset, needed, got }
///     ├── Err(Interrupted)   → retry
///     └── Err(other)         → Io(other)
/// ```
#[derive(Debug)]
pub struct ExactReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> ExactReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Number of bytes consumed from the source so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fill `buf` completely from the source.
    ///
    /// An empty `buf` succeeds without touching the source.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if the source ends first.
    /// - [`WireError::Io`] for any other read failure.
    pub fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        let start = self.position;
        let mut filled = 0;

        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(WireError::UnexpectedEof {
                        offset: start,
                        needed: buf.len(),
                        got: filled,
                    });
                }
                Ok(n) => {
                    filled += n;
                    self.position += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(WireError::Io(e)),
            }
        }

        Ok(())
    }

    /// Read exactly `n` bytes into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// Same as [`read_exact_into`](Self::read_exact_into).
    pub fn read_vec(&mut self, n: usize) -> Result<Vec<u8>, WireError> {
        let mut buf = vec![0u8; n];
        self.read_exact_into(&mut buf)?;
        Ok(buf)
    }

    /// Read a single byte (record tags).
    ///
    /// # Errors
    ///
    /// Same as [`read_exact_into`](Self::read_exact_into).
    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        let mut byte = [0u8; 1];
        self.read_exact_into(&mut byte)?;
        Ok(byte[0])
    }

    /// Read and drop exactly `n` bytes.
    ///
    /// The stream is not seekable, so skipping means reading. Bytes are
    /// pulled through a small scratch buffer so `n` never dictates the
    /// allocation size.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] reports the offset where the discard
    /// began and the full `n`, not the offset of the failing piece.
    pub fn discard(&mut self, n: usize) -> Result<(), WireError> {
        let start = self.position;
        let mut scratch = [0u8; DISCARD_BUF_SIZE];
        let mut remaining = n;

        while remaining > 0 {
            let piece = remaining.min(DISCARD_BUF_SIZE);
            match self.read_exact_into(&mut scratch[..piece]) {
                Ok(()) => remaining -= piece,
                Err(WireError::UnexpectedEof { got, .. }) => {
                    return Err(WireError::UnexpectedEof {
                        offset: start,
                        needed: n,
                        got: n - remaining + got,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
