use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

use rbd_wire::ExactReader;

use crate::error::ApplyError;

/// Copies a chunk from a source to absolute offsets on a seekable sink
/// through one bounded, reusable buffer.
///
/// ```text
///   remaining = length
///   while remaining > 0:
///     piece = min(remaining, max_unit)
///     read exactly `piece` bytes from source   (EOF → UnexpectedEof)
///     seek sink to `offset`                    (absolute, never relative)
///     write piece                              (short → continue, EINTR → retry)
///     offset += piece; remaining -= piece
///     on_piece(offset, piece)
/// ```
///
/// The source is either the diff stream itself or a zero generator; the
/// writer does not care which.
#[derive(Debug)]
pub struct ChunkWriter {
    buf: Vec<u8>,
}

impl ChunkWriter {
    /// Create a writer whose pieces are at most `max_unit` bytes (minimum 1).
    pub fn new(max_unit: usize) -> Self {
        Self {
            buf: vec![0u8; max_unit.max(1)],
        }
    }

    pub fn max_unit(&self) -> usize {
        self.buf.len()
    }

    /// Copy `length` bytes from `source` to `sink` starting at `offset`.
    ///
    /// `on_piece(end_offset, piece_len)` runs after every piece lands,
    /// so callers can report progress without the writer knowing about it.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::UnexpectedEof`] if the source runs out early.
    /// - [`ApplyError::Io`] for seek or write failures, including a sink
    ///   that accepts zero bytes.
    /// - Whatever `on_piece` returns.
    pub fn copy<S, W, F>(
        &mut self,
        source: &mut ExactReader<S>,
        sink: &mut W,
        offset: u64,
        length: u64,
        mut on_piece: F,
    ) -> Result<(), ApplyError>
    where
        S: Read,
        W: Write + Seek,
        F: FnMut(u64, u64) -> Result<(), ApplyError>,
    {
        let mut offset = offset;
        let mut remaining = length;

        while remaining > 0 {
            let piece = usize::try_from(remaining).map_or(self.buf.len(), |r| r.min(self.buf.len()));
            let buf = &mut self.buf[..piece];

            source.read_exact_into(buf)?;
            sink.seek(SeekFrom::Start(offset))?;
            write_fully(sink, buf)?;

            let piece = piece as u64;
            offset += piece;
            remaining -= piece;
            on_piece(offset, piece)?;
        }

        Ok(())
    }
}

/// Write all of `buf`, continuing after short writes and retrying
/// interrupted ones.
fn write_fully<W: Write>(sink: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match sink.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "target accepted no bytes",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
