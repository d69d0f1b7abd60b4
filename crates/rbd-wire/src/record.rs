/// Upper bound on a snapshot-name length and on a single read piece.
///
/// Names longer than this are treated as corrupt input rather than
/// allocated, and chunk payloads are streamed in pieces of at most this
/// many bytes.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Record tags — the single byte that opens every record after the magic.
///
/// ```text
/// ┌─────┬──────────────┬──────────────────────────────────────────────┐
/// │ Tag │ Variant      │ Layout after the tag                         │
/// ├─────┼──────────────┼──────────────────────────────────────────────┤
/// │ 'f' │ FromSnapshot │ i32 len, len bytes (discarded)               │
/// │ 't' │ ToSnapshot   │ i32 len, len bytes (discarded)               │
/// │ 's' │ Size         │ i64 image size                               │
/// │ 'w' │ Write        │ i64 offset, i64 length, length payload bytes │
/// │ 'z' │ Zero         │ i64 offset, i64 length                       │
/// │ 'e' │ End          │ nothing                                      │
/// └─────┴──────────────┴──────────────────────────────────────────────┘
/// ```
///
/// All integers are signed little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordTag {
    FromSnapshot,
    ToSnapshot,
    Size,
    Write,
    Zero,
    End,
}

impl RecordTag {
    /// Map a wire byte to its tag. Unknown bytes return `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'f' => Some(Self::FromSnapshot),
            b't' => Some(Self::ToSnapshot),
            b's' => Some(Self::Size),
            b'w' => Some(Self::Write),
            b'z' => Some(Self::Zero),
            b'e' => Some(Self::End),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::FromSnapshot => b'f',
            Self::ToSnapshot => b't',
            Self::Size => b's',
            Self::Write => b'w',
            Self::Zero => b'z',
            Self::End => b'e',
        }
    }
}

/// Where a data chunk's payload bytes come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkSource {
    /// Payload follows the header in the diff stream itself.
    Literal,
    /// Payload is implicit zeros; nothing more is read from the stream.
    ZeroFill,
}
