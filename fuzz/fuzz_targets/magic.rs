#![no_main]

use libfuzzer_sys::fuzz_target;
use rbd_wire::{ExactReader, WireError, read_magic};

// Fuzz target: read_magic with arbitrary bytes.
//
// Catches bugs in:
// - Short stream handling (< 12 bytes)
// - Byte-exact comparison
// - Error message escaping of arbitrary bytes
fuzz_target!(|data: &[u8]| {
    let mut reader = ExactReader::new(data);
    match read_magic(&mut reader) {
        Ok(()) => assert_eq!(&data[..12], b"rbd diff v1\n"),
        Err(e @ WireError::InvalidMagic { .. }) => {
            let _ = e.to_string();
        }
        Err(_) => assert!(data.len() < 12),
    }
});
