#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sponge::{frame, MemoryLog, Persistence, SpongeConfig, SpongeEngine};
use std::collections::VecDeque;

#[derive(Arbitrary, Debug)]
enum BufferOp {
    Persist { tag: [u8; 2], payload: Vec<u8> },
    Fetch,
}

fuzz_target!(|ops: Vec<BufferOp>| {
    let config = SpongeConfig::default().with_batch_write_count(3);
    let engine = match SpongeEngine::with_log(MemoryLog::new(), &config) {
        Ok(engine) => engine,
        Err(_) => return,
    };
    let mut model = VecDeque::new();

    for op in ops.iter().take(200) {
        match op {
            BufferOp::Persist { tag, payload } => {
                if payload.len() > 1024 {
                    continue;
                }
                if let Ok(record) = frame::encode(*tag, payload) {
                    assert!(engine.persist_data(record.clone()));
                    model.push_back(record);
                }
            }
            BufferOp::Fetch => {
                let fetched = engine.fetch_data_from_persistence().ok().flatten();
                assert_eq!(fetched, model.pop_front());
            }
        }
    }
});
