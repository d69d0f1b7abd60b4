#![no_main]

use libfuzzer_sys::fuzz_target;
use rbd_wire::{ExactReader, RecordTag};

// Fuzz target: tag lookup and little-endian field decoding.
//
// Catches bugs in:
// - Tag byte mapping (from_byte / as_byte agreement)
// - Position accounting across i32/i64 reads
// - Discard of arbitrary lengths against short input
fuzz_target!(|data: &[u8]| {
    let mut reader = ExactReader::new(data);
    while let Ok(byte) = reader.read_u8() {
        if let Some(tag) = RecordTag::from_byte(byte) {
            assert_eq!(tag.as_byte(), byte);
        }
        let before = reader.position();
        let Ok(len) = reader.read_i32_le() else {
            break;
        };
        assert_eq!(reader.position(), before + 4);
        if reader.discard((len.unsigned_abs() & 0xFFFF) as usize).is_err() {
            break;
        }
        if reader.read_i64_le().is_err() {
            break;
        }
    }
});
