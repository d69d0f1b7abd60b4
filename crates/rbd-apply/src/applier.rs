use std::io::{self, Read, Seek, Write};

use rbd_wire::{ChunkSource, ExactReader, MAX_RECORD_SIZE, RecordTag, read_magic};

use crate::chunk_writer::ChunkWriter;
use crate::clock::{Clock, CoarseClock};
use crate::config::ApplyConfig;
use crate::error::ApplyError;
use crate::image_size::ImageSize;
use crate::progress::ProgressMeter;

/// Totals gathered while applying a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Records processed, including the end marker.
    pub records: u64,
    pub snapshots_skipped: u64,
    /// Payload bytes copied from the stream.
    pub literal_bytes: u64,
    /// Zero bytes synthesized for `z` records.
    pub zero_bytes: u64,
    pub image_size: Option<u64>,
}

/// Internal state machine for the applier.
///
/// ```text
///   AwaitingMagic → ReadingRecords → Terminated
///         │               │
///         └───────────────┴──→ Failed
/// ```
///
/// `Terminated` is only reached through an end marker. Any error moves the
/// applier to `Failed`; the stream position is then mid-record and nothing
/// more is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    AwaitingMagic,
    ReadingRecords,
    Terminated,
    Failed,
}

/// Mutable state shared by the record handlers.
struct ApplyState<P, C> {
    image_size: ImageSize,
    progress: ProgressMeter<P, C>,
}

/// Replays an rbd diff stream onto a seekable target.
///
/// The applier reads the magic, then one record at a time:
///
/// ```text
/// ┌─────┬───────────────────────────────────────────────────────────────┐
/// │ Tag │ Handling                                                      │
/// ├─────┼───────────────────────────────────────────────────────────────┤
/// │ f/t │ read i32 length, reject < 0 or > 1 MiB, read and drop name    │
/// │ s   │ read i64 size, reject < 0, declare once, draw baseline bar    │
/// │ w   │ read offset/length, validate, copy payload from the stream    │
/// │ z   │ read offset/length, validate, copy from the zero source       │
/// │ e   │ final rate over total time, 100% bar, newline, stop           │
/// │ *   │ UnknownTag                                                    │
/// └─────┴───────────────────────────────────────────────────────────────┘
/// ```
///
/// Offsets and lengths are validated before a single payload byte is
/// read or written, so a rejected chunk leaves the target untouched.
pub struct DiffApplier<R, W, P, C = CoarseClock> {
    stream: ExactReader<R>,
    sink: W,
    zeros: ExactReader<io::Repeat>,
    writer: ChunkWriter,
    state: ApplyState<P, C>,
    stats: ApplyStats,
    phase: Phase,
}

// ── Construction ────────────────────────────────────────────────────────

impl<R: Read, W: Write + Seek, P: Write> DiffApplier<R, W, P, CoarseClock> {
    /// Create an applier timed by a whole-second clock.
    ///
    /// Use [`with_clock`](Self::with_clock) and a
    /// [`SystemClock`](crate::SystemClock) for sub-second rate samples.
    pub fn new(stream: R, sink: W, progress_out: P, config: &ApplyConfig) -> Self {
        Self::with_clock(stream, sink, progress_out, CoarseClock::new(), config)
    }
}

impl<R: Read, W: Write + Seek, P: Write, C: Clock> DiffApplier<R, W, P, C> {
    pub fn with_clock(stream: R, sink: W, progress_out: P, clock: C, config: &ApplyConfig) -> Self {
        Self {
            stream: ExactReader::new(stream),
            sink,
            zeros: ExactReader::new(io::repeat(0)),
            writer: ChunkWriter::new(config.effective_max_unit()),
            state: ApplyState {
                image_size: ImageSize::new(),
                progress: ProgressMeter::new(progress_out, clock, config),
            },
            stats: ApplyStats::default(),
            phase: Phase::AwaitingMagic,
        }
    }

    /// Apply the whole stream, returning once the end marker is processed.
    ///
    /// # Errors
    ///
    /// Any [`ApplyError`]. Errors are fatal; bytes already written stay
    /// written. Calling `run` again after success yields
    /// [`ApplyError::AlreadyTerminated`], and after a failure
    /// [`ApplyError::AlreadyFailed`].
    pub fn run(&mut self) -> Result<ApplyStats, ApplyError> {
        match self.phase {
            Phase::Terminated => return Err(ApplyError::AlreadyTerminated),
            Phase::Failed => return Err(ApplyError::AlreadyFailed),
            Phase::AwaitingMagic | Phase::ReadingRecords => {}
        }

        let result = self.apply_records();
        if result.is_err() {
            self.phase = Phase::Failed;
        }
        result
    }

    // ── Record dispatch ─────────────────────────────────────────────────

    fn apply_records(&mut self) -> Result<ApplyStats, ApplyError> {
        if self.phase == Phase::AwaitingMagic {
            read_magic(&mut self.stream)?;
            self.phase = Phase::ReadingRecords;
        }

        loop {
            let offset = self.stream.position();
            let byte = self.stream.read_u8()?;
            let Some(tag) = RecordTag::from_byte(byte) else {
                return Err(ApplyError::UnknownTag { tag: byte, offset });
            };
            self.stats.records += 1;

            match tag {
                RecordTag::FromSnapshot | RecordTag::ToSnapshot => self.skip_snapshot_name(tag)?,
                RecordTag::Size => self.declare_size()?,
                RecordTag::Write => self.apply_chunk(ChunkSource::Literal)?,
                RecordTag::Zero => self.apply_chunk(ChunkSource::ZeroFill)?,
                RecordTag::End => {
                    self.state.progress.finish()?;
                    self.sink.flush()?;
                    self.phase = Phase::Terminated;
                    tracing::info!(
                        records = self.stats.records,
                        literal_bytes = self.stats.literal_bytes,
                        zero_bytes = self.stats.zero_bytes,
                        rate = self.state.progress.rate(),
                        "diff applied"
                    );
                    return Ok(self.stats);
                }
            }
        }
    }

    // ── Record handlers ─────────────────────────────────────────────────

    fn skip_snapshot_name(&mut self, tag: RecordTag) -> Result<(), ApplyError> {
        let offset = self.stream.position();
        let len = self.stream.read_i32_le()?;
        let len = usize::try_from(len).map_err(|_| ApplyError::NegativeField {
            field: "snapshot name length",
            value: i64::from(len),
            offset,
        })?;
        if len > MAX_RECORD_SIZE {
            return Err(ApplyError::NameTooLong {
                len,
                limit: MAX_RECORD_SIZE,
                offset,
            });
        }

        self.stream.discard(len)?;
        self.stats.snapshots_skipped += 1;
        tracing::debug!(tag = ?tag, len, "skipped snapshot name");
        Ok(())
    }

    fn declare_size(&mut self) -> Result<(), ApplyError> {
        let size = self.read_non_negative("image size")?;
        self.state.image_size.set(size)?;
        self.stats.image_size = Some(size);
        tracing::debug!(size, "image size declared");

        self.state.progress.update(0, 0, Some(size))?;
        Ok(())
    }

    fn apply_chunk(&mut self, source: ChunkSource) -> Result<(), ApplyError> {
        let offset = self.read_non_negative("chunk offset")?;
        let length = self.read_non_negative("chunk length")?;
        self.state.image_size.check_bounds(offset, length)?;
        tracing::debug!(?source, offset, length, "applying chunk");

        let size = self.state.image_size.get();
        let progress = &mut self.state.progress;
        progress.update(offset, 0, size)?;

        let on_piece = |end: u64, n: u64| progress.update(end, n, size).map_err(ApplyError::from);
        match source {
            ChunkSource::Literal => {
                self.writer
                    .copy(&mut self.stream, &mut self.sink, offset, length, on_piece)?;
                self.stats.literal_bytes += length;
            }
            ChunkSource::ZeroFill => {
                self.writer
                    .copy(&mut self.zeros, &mut self.sink, offset, length, on_piece)?;
                self.stats.zero_bytes += length;
            }
        }
        Ok(())
    }

    // ── Field helpers ───────────────────────────────────────────────────

    /// Read an i64 field and reject negatives.
    fn read_non_negative(&mut self, field: &'static str) -> Result<u64, ApplyError> {
        let offset = self.stream.position();
        let value = self.stream.read_i64_le()?;
        u64::try_from(value).map_err(|_| ApplyError::NegativeField {
            field,
            value,
            offset,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Totals so far. After a failure these describe what was applied
    /// before the error.
    pub fn stats(&self) -> ApplyStats {
        self.stats
    }

    /// Bytes consumed from the diff stream so far.
    pub fn stream_position(&self) -> u64 {
        self.stream.position()
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Tear the applier down into the target and the progress sink.
    pub fn into_parts(self) -> (W, P) {
        (self.sink, self.state.progress.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use rbd_wire::RBD_DIFF_MAGIC;
    use std::io::Cursor;

    fn stream(records: &[&[u8]]) -> Vec<u8> {
        let mut out = RBD_DIFF_MAGIC.to_vec();
        for r in records {
            out.extend_from_slice(r);
        }
        out
    }

    fn chunk(tag: u8, offset: i64, length: i64, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn size(size: i64) -> Vec<u8> {
        let mut out = vec![b's'];
        out.extend_from_slice(&size.to_le_bytes());
        out
    }

    fn name(tag: u8, len: i32, body: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn quiet() -> ApplyConfig {
        ApplyConfig {
            progress: false,
            ..ApplyConfig::default()
        }
    }

    fn apply(bytes: Vec<u8>, target: Vec<u8>) -> (Result<ApplyStats, ApplyError>, Vec<u8>) {
        let mut applier =
            DiffApplier::new(Cursor::new(bytes), Cursor::new(target), io::sink(), &quiet());
        let result = applier.run();
        let (sink, _) = applier.into_parts();
        (result, sink.into_inner())
    }

    #[test]
    fn applies_literal_and_zero_chunks() {
        let bytes = stream(&[
            &size(16),
            &chunk(b'w', 0, 4, b"AAAA"),
            &chunk(b'z', 8, 4, b""),
            b"e",
        ]);
        let (result, target) = apply(bytes, vec![0x11; 16]);
        let stats = result.unwrap();

        let mut expected = b"AAAA".to_vec();
        expected.extend_from_slice(&[0x11; 4]);
        expected.extend_from_slice(&[0; 4]);
        expected.extend_from_slice(&[0x11; 4]);
        assert_eq!(target, expected);
        assert_eq!(
            stats,
            ApplyStats {
                records: 4,
                snapshots_skipped: 0,
                literal_bytes: 4,
                zero_bytes: 4,
                image_size: Some(16),
            }
        );
    }

    #[test]
    fn snapshot_names_are_consumed_not_interpreted() {
        let bytes = stream(&[
            &name(b'f', 4, b"snap"),
            &name(b't', 0, b""),
            &chunk(b'w', 1, 1, b"!"),
            b"e",
        ]);
        let (result, target) = apply(bytes, vec![0; 3]);
        assert_eq!(result.unwrap().snapshots_skipped, 2);
        assert_eq!(target, b"\0!\0");
    }

    #[test]
    fn stops_at_end_marker_without_reading_further() {
        let bytes = stream(&[b"e", b"garbage"]);
        let mut applier =
            DiffApplier::new(Cursor::new(bytes), Cursor::new(Vec::<u8>::new()), io::sink(), &quiet());
        applier.run().unwrap();
        assert!(applier.is_terminated());
        assert_eq!(applier.stream_position(), 13);
        assert!(matches!(applier.run(), Err(ApplyError::AlreadyTerminated)));
    }

    #[test]
    fn bad_magic_is_format_error() {
        let mut bytes = b"rbd diff v2\n".to_vec();
        bytes.push(b'e');
        let (result, _) = apply(bytes, Vec::new());
        assert_eq!(result.unwrap_err().class(), ErrorClass::Format);
    }

    #[test]
    fn unknown_tag_reports_offset() {
        let (result, target) = apply(stream(&[b"x"]), vec![7; 4]);
        assert!(matches!(
            result,
            Err(ApplyError::UnknownTag { tag: b'x', offset: 12 })
        ));
        assert_eq!(target, vec![7; 4]);
    }

    #[test]
    fn negative_fields_are_rejected() {
        let cases: [(Vec<u8>, &str); 4] = [
            (size(-1), "image size"),
            (chunk(b'w', -4, 4, b"AAAA"), "chunk offset"),
            (chunk(b'z', 0, -4, b""), "chunk length"),
            (name(b'f', -2, b""), "snapshot name length"),
        ];
        for (record, expected) in cases {
            let (result, _) = apply(stream(&[&record, b"e"]), vec![0; 8]);
            match result {
                Err(ApplyError::NegativeField { field, offset, .. }) => {
                    assert_eq!(field, expected);
                    assert!(offset >= 13);
                }
                other => panic!("expected NegativeField for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn oversized_name_is_rejected_before_reading_it() {
        let len = i32::try_from(MAX_RECORD_SIZE + 1).unwrap();
        let (result, _) = apply(stream(&[&name(b't', len, b"")]), Vec::new());
        assert!(matches!(result, Err(ApplyError::NameTooLong { .. })));
    }

    #[test]
    fn out_of_bounds_chunk_writes_nothing() {
        let bytes = stream(&[&size(8), &chunk(b'w', 6, 4, b"BBBB"), b"e"]);
        let (result, target) = apply(bytes, vec![1; 8]);
        assert!(matches!(
            result,
            Err(ApplyError::OutOfBounds {
                offset: 6,
                length: 4,
                image_size: 8
            })
        ));
        assert_eq!(target, vec![1; 8]);
    }

    #[test]
    fn truncated_payload_is_eof() {
        let bytes = stream(&[&chunk(b'w', 0, 8, b"abc")]);
        let (result, _) = apply(bytes, Vec::new());
        assert_eq!(result.unwrap_err().class(), ErrorClass::UnexpectedEof);
    }

    #[test]
    fn missing_end_marker_is_eof() {
        let (result, _) = apply(stream(&[&size(4)]), Vec::new());
        assert!(matches!(
            result,
            Err(ApplyError::UnexpectedEof { offset: 21, needed: 1, got: 0 })
        ));
    }

    #[test]
    fn second_size_record_is_rejected() {
        let (result, _) = apply(stream(&[&size(4), &size(8), b"e"]), Vec::new());
        assert!(matches!(result, Err(ApplyError::SizeRedeclared { .. })));
    }

    #[test]
    fn failed_applier_refuses_to_resume() {
        // The bad chunk fails mid-record; the bytes after it look like a
        // valid write and must never be applied.
        let bytes = stream(&[
            &size(4),
            &chunk(b'w', 2, 4, b""),
            &chunk(b'w', 0, 1, b"X"),
            b"e",
        ]);
        let mut applier = DiffApplier::new(
            Cursor::new(bytes),
            Cursor::new(vec![0u8; 4]),
            io::sink(),
            &quiet(),
        );
        assert!(matches!(applier.run(), Err(ApplyError::OutOfBounds { .. })));
        let position = applier.stream_position();

        assert!(matches!(applier.run(), Err(ApplyError::AlreadyFailed)));
        assert_eq!(applier.stream_position(), position);
        assert!(!applier.is_terminated());
        assert_eq!(applier.stats().records, 2);
        assert_eq!(applier.stats().literal_bytes, 0);

        let (sink, _) = applier.into_parts();
        assert_eq!(sink.into_inner(), vec![0; 4]);
    }

    #[test]
    fn default_clock_holds_rate_at_zero_within_first_second() {
        let bytes = stream(&[
            &size(64),
            &chunk(b'w', 0, 32, &[0xAB; 32]),
            &chunk(b'z', 32, 32, b""),
            b"e",
        ]);
        let config = ApplyConfig {
            max_unit: 8,
            ..ApplyConfig::default()
        };
        let mut applier = DiffApplier::new(
            Cursor::new(bytes),
            Cursor::new(Vec::<u8>::new()),
            Vec::<u8>::new(),
            &config,
        );
        applier.run().unwrap();
        let (_, progress) = applier.into_parts();
        let progress = String::from_utf8(progress).unwrap();

        let frames: Vec<&str> = progress.trim_end_matches('\n').split('\r').skip(1).collect();
        let (last, mid) = frames.split_last().unwrap();
        assert!(mid.len() > 4);
        for frame in mid {
            assert!(frame.ends_with("0.00 B/s)"), "{frame:?}");
        }
        assert!(last.contains("(100%, "));
    }

    #[test]
    fn system_clock_is_opt_in() {
        let bytes = stream(&[&chunk(b'w', 0, 2, b"hi"), b"e"]);
        let mut applier = DiffApplier::with_clock(
            Cursor::new(bytes),
            Cursor::new(Vec::<u8>::new()),
            io::sink(),
            crate::SystemClock::new(),
            &quiet(),
        );
        assert_eq!(applier.run().unwrap().literal_bytes, 2);
    }

    #[test]
    fn small_max_unit_still_copies_everything() {
        let payload: Vec<u8> = (0..=255).collect();
        let bytes = stream(&[&chunk(b'w', 0, 256, &payload), b"e"]);
        let config = ApplyConfig {
            max_unit: 7,
            progress: false,
            ..ApplyConfig::default()
        };
        let mut applier = DiffApplier::new(
            Cursor::new(bytes),
            Cursor::new(Vec::<u8>::new()),
            io::sink(),
            &config,
        );
        applier.run().unwrap();
        let (sink, _) = applier.into_parts();
        assert_eq!(sink.into_inner(), payload);
    }
}
