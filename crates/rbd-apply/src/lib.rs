#![warn(clippy::pedantic)]

pub mod applier;
pub mod chunk_writer;
pub mod clock;
pub mod config;
pub mod error;
pub mod image_size;
pub mod progress;

pub use applier::{ApplyStats, DiffApplier};
pub use chunk_writer::ChunkWriter;
pub use clock::{Clock, CoarseClock, SystemClock};
pub use config::ApplyConfig;
pub use error::{ApplyError, ErrorClass};
pub use image_size::ImageSize;
pub use progress::{ProgressMeter, format_rate, render_bar};
