#![warn(clippy::pedantic)]

pub mod error;
pub mod exact;
pub mod le;
pub mod magic;
pub mod record;

pub use error::WireError;
pub use exact::ExactReader;
pub use magic::{MAGIC_LEN, RBD_DIFF_MAGIC, read_magic};
pub use record::{ChunkSource, MAX_RECORD_SIZE, RecordTag};
