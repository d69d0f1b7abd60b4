use rbd_wire::WireError;

/// Errors that abort applying a diff stream.
///
/// Every variant is fatal: there is no record skipping and no retry of
/// malformed input. The only condition retried silently is an interrupted
/// write, which never surfaces here.
///
/// ```text
///   ApplyError                         class()
///   ├── Format(WireError)            ← Format         magic mismatch
///   ├── UnknownTag                   ← Protocol
///   ├── NegativeField                ← Protocol       size, offset, length, name length
///   ├── NameTooLong                  ← Protocol
///   ├── OutOfBounds                  ← Protocol       offset + length > image size
///   ├── SizeRedeclared               ← Protocol
///   ├── UnexpectedEof                ← UnexpectedEof
///   ├── Io(std::io::Error)           ← Io
///   ├── AlreadyTerminated            ← Protocol       run() after the end marker
///   └── AlreadyFailed                ← Protocol       run() after an error
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The stream does not start with the v1 magic.
    #[error("not an rbd diff v1 stream: {0}")]
    Format(WireError),

    /// A record tag byte that the format does not define.
    #[error("unknown record tag {tag:#04X} ({}) at offset {offset}", .tag.escape_ascii())]
    UnknownTag { tag: u8, offset: u64 },

    /// A signed field that must not be negative was.
    #[error("negative {field} {value} at offset {offset}")]
    NegativeField {
        field: &'static str,
        value: i64,
        offset: u64,
    },

    /// A snapshot name length beyond the record size limit.
    #[error("snapshot name length {len} exceeds limit {limit} at offset {offset}")]
    NameTooLong { len: usize, limit: usize, offset: u64 },

    /// A chunk reaching past the declared image size.
    #[error("chunk at offset {offset} with length {length} exceeds image size {image_size}")]
    OutOfBounds {
        offset: u64,
        length: u64,
        image_size: u64,
    },

    /// A second size record after the image size was already declared.
    #[error("image size already declared as {current}, refusing to change it to {requested}")]
    SizeRedeclared { current: u64, requested: u64 },

    /// The stream ended inside a record.
    #[error("unexpected end of stream at offset {offset}: needed {needed} bytes, got {got}")]
    UnexpectedEof { offset: u64, needed: usize, got: usize },

    /// Read, write, or seek failure on the stream or the target.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The applier already consumed an end marker.
    #[error("diff stream already applied")]
    AlreadyTerminated,

    /// An earlier `run` failed part way through a record.
    #[error("diff stream already failed, refusing to resume mid-record")]
    AlreadyFailed,
}

/// Coarse classification of an [`ApplyError`], matching the error
/// taxonomy reported to users.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Format,
    Protocol,
    UnexpectedEof,
    Io,
}

impl ApplyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Format(_) => ErrorClass::Format,
            Self::UnknownTag { .. }
            | Self::NegativeField { .. }
            | Self::NameTooLong { .. }
            | Self::OutOfBounds { .. }
            | Self::SizeRedeclared { .. }
            | Self::AlreadyTerminated
            | Self::AlreadyFailed => ErrorClass::Protocol,
            Self::UnexpectedEof { .. } => ErrorClass::UnexpectedEof,
            Self::Io(_) => ErrorClass::Io,
        }
    }
}

impl From<WireError> for ApplyError {
    /// Lift a framing error into the apply taxonomy.
    ///
    /// An `InvalidMagic` reaching this conversion is still a format error;
    /// EOF and I/O keep their own classes.
    fn from(e: WireError) -> Self {
        match e {
            WireError::UnexpectedEof {
                offset,
                needed,
                got,
            } => Self::UnexpectedEof {
                offset,
                needed,
                got,
            },
            WireError::Io(e) => Self::Io(e),
            e @ WireError::InvalidMagic { .. } => Self::Format(e),
        }
    }
}
