/// Low-level errors raised while pulling bytes off a diff stream.
///
/// These only describe *framing* problems: the stream ran dry, the magic
/// prefix was wrong, or the underlying reader failed. Semantic checks
/// (negative fields, bounds, unknown tags) live one layer up in
/// `rbd-apply`.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The stream ended before a field or payload was complete.
    ///
    /// `offset` is the stream position at which the read started,
    /// `needed` the requested byte count and `got` how many arrived
    /// before end-of-stream.
    #[error("unexpected end of stream at offset {offset}: needed {needed} bytes, got {got}")]
    UnexpectedEof { offset: u64, needed: usize, got: usize },

    /// The 12-byte prefix was not `"rbd diff v1\n"`.
    #[error("invalid magic: expected \"rbd diff v1\\n\", got \"{}\"", .found.escape_ascii())]
    InvalidMagic { found: [u8; 12] },

    /// I/O error from the underlying reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
