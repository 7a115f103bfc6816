#![no_main]

use libfuzzer_sys::fuzz_target;
use sponge_core::frame;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1_000_000 {
        return;
    }

    // Whole-buffer validation should never panic
    let _ = frame::validate(data);
    let _ = frame::tag(data);
    let _ = frame::payload(data);

    // Walk the buffer as a log would; every frame returned must fit
    let mut offset = 0;
    while let Ok(Some(record)) = frame::frame_at(data, offset) {
        assert!(record.len() >= frame::HEADER_LEN);
        assert!(offset + record.len() <= data.len());
        offset += record.len();
    }
});
