#![no_main]

use std::io::{self, Seek, SeekFrom, Write};

use libfuzzer_sys::fuzz_target;
use rbd_apply::{ApplyConfig, DiffApplier};

/// Seekable target that remembers nothing but its cursor.
#[derive(Default)]
struct NullTarget {
    pos: u64,
}

impl Write for NullTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for NullTarget {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if let SeekFrom::Start(p) = pos {
            self.pos = p;
        }
        Ok(self.pos)
    }
}

// Fuzz target: full applier over arbitrary records.
//
// The input is prefixed with the magic and a 1 MiB size record so chunk
// lengths stay bounded; every record after that comes from the fuzzer.
//
// Catches bugs in:
// - Tag dispatch and unknown tags
// - Negative / overflowing offset and length handling
// - Snapshot name length limits
// - Truncated records at every position
fuzz_target!(|data: &[u8]| {
    let mut stream = b"rbd diff v1\ns".to_vec();
    stream.extend_from_slice(&(1i64 << 20).to_le_bytes());
    stream.extend_from_slice(data);

    let config = ApplyConfig {
        progress: false,
        max_unit: 4096,
        ..ApplyConfig::default()
    };
    let mut applier = DiffApplier::new(stream.as_slice(), NullTarget::default(), io::sink(), &config);
    let _ = applier.run();
});
