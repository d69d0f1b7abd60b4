//! Test support: build diff streams by hand and run them through the
//! applier against in-memory targets.
//!
//! Producing diffs is not something the tool does, so the builder lives
//! here rather than in `rbd-wire`. It deliberately allows malformed
//! output (negative fields, bad tags, short payloads) for edge case tests.

use std::cell::Cell;
use std::io::{self, Cursor};
use std::time::Duration;

use rbd_apply::{ApplyConfig, ApplyError, ApplyStats, Clock, DiffApplier};
use rbd_wire::{RBD_DIFF_MAGIC, RecordTag};

/// Byte-level diff stream builder.
///
/// ```rust
/// use rbd_tests::DiffStreamBuilder;
///
/// let stream = DiffStreamBuilder::new()
///     .size(16)
///     .write(0, b"AAAA")
///     .zero(8, 4)
///     .end()
///     .build();
/// assert!(stream.starts_with(b"rbd diff v1\n"));
/// ```
#[derive(Clone, Debug)]
pub struct DiffStreamBuilder {
    buf: Vec<u8>,
}

impl Default for DiffStreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffStreamBuilder {
    /// Start a stream with the v1 magic.
    pub fn new() -> Self {
        Self::with_magic(&RBD_DIFF_MAGIC)
    }

    /// Start a stream with arbitrary leading bytes in place of the magic.
    pub fn with_magic(magic: &[u8]) -> Self {
        Self {
            buf: magic.to_vec(),
        }
    }

    pub fn from_snap(&mut self, name: &str) -> &mut Self {
        self.snap_name(RecordTag::FromSnapshot, name.as_bytes())
    }

    pub fn to_snap(&mut self, name: &str) -> &mut Self {
        self.snap_name(RecordTag::ToSnapshot, name.as_bytes())
    }

    fn snap_name(&mut self, tag: RecordTag, name: &[u8]) -> &mut Self {
        let len = i32::try_from(name.len()).expect("snapshot name fits in i32");
        self.name_header(tag, len);
        self.buf.extend_from_slice(name);
        self
    }

    /// A snapshot-name header with an arbitrary length and no body.
    pub fn name_header(&mut self, tag: RecordTag, len: i32) -> &mut Self {
        self.buf.push(tag.as_byte());
        self.buf.extend_from_slice(&len.to_le_bytes());
        self
    }

    pub fn size(&mut self, size: i64) -> &mut Self {
        self.buf.push(RecordTag::Size.as_byte());
        self.buf.extend_from_slice(&size.to_le_bytes());
        self
    }

    /// A literal chunk whose length matches `data`.
    pub fn write(&mut self, offset: i64, data: &[u8]) -> &mut Self {
        let length = i64::try_from(data.len()).expect("payload fits in i64");
        self.chunk_header(RecordTag::Write, offset, length);
        self.buf.extend_from_slice(data);
        self
    }

    pub fn zero(&mut self, offset: i64, length: i64) -> &mut Self {
        self.chunk_header(RecordTag::Zero, offset, length)
    }

    /// Tag, offset and length only; payload (if any) is up to the caller.
    pub fn chunk_header(&mut self, tag: RecordTag, offset: i64, length: i64) -> &mut Self {
        self.buf.push(tag.as_byte());
        self.buf.extend_from_slice(&offset.to_le_bytes());
        self.buf.extend_from_slice(&length.to_le_bytes());
        self
    }

    pub fn end(&mut self) -> &mut Self {
        self.buf.push(RecordTag::End.as_byte());
        self
    }

    /// Append raw bytes, e.g. an unknown tag or a truncated payload.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(Cell<Duration>);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

/// Outcome of [`apply`]: the result, the final target bytes and the raw
/// progress output.
pub struct Applied {
    pub result: Result<ApplyStats, ApplyError>,
    pub target: Vec<u8>,
    pub progress: String,
}

/// Apply `stream` to an in-memory copy of `target` with a frozen clock.
pub fn apply(stream: &[u8], target: Vec<u8>, config: &ApplyConfig) -> Applied {
    let clock = ManualClock::default();
    let mut applier = DiffApplier::with_clock(
        Cursor::new(stream),
        Cursor::new(target),
        Vec::<u8>::new(),
        &clock,
        config,
    );
    let result = applier.run();
    let (sink, progress) = applier.into_parts();
    Applied {
        result,
        target: sink.into_inner(),
        progress: String::from_utf8_lossy(&progress).into_owned(),
    }
}

/// [`apply`] with the progress line switched off.
pub fn apply_quiet(stream: &[u8], target: Vec<u8>) -> Applied {
    let config = ApplyConfig {
        progress: false,
        ..ApplyConfig::default()
    };
    apply(stream, target, &config)
}

/// Split raw progress output into the successive redraws.
pub fn progress_frames(progress: &str) -> Vec<&str> {
    progress
        .split('\r')
        .map(|frame| frame.trim_end_matches('\n'))
        .filter(|frame| !frame.is_empty())
        .collect()
}

/// A reader that fails on every call, for I/O error paths.
pub struct FailingReader;

impl io::Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("stream source failed"))
    }
}
