#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sponge_log::{FileLog, LogBackend, SyncMode, CURSOR_FILE_NAME, DATA_FILE_NAME};

#[derive(Arbitrary, Debug)]
struct DamagedLog {
    data: Vec<u8>,
    cursor: Vec<u8>,
}

fuzz_target!(|input: DamagedLog| {
    if input.data.len() > 64 * 1024 || input.cursor.len() > 16 {
        return;
    }

    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    if std::fs::write(dir.path().join(DATA_FILE_NAME), &input.data).is_err()
        || std::fs::write(dir.path().join(CURSOR_FILE_NAME), &input.cursor).is_err()
    {
        return;
    }

    // Open repairs or rejects the files; reading afterwards must not panic
    if let Ok(mut log) = FileLog::open(dir.path(), SyncMode::None) {
        let mut reads = 0;
        while let Ok(Some(_)) = log.read_next() {
            reads += 1;
            if reads > 100_000 {
                break;
            }
        }
        assert!(log.read_position() <= log.write_position());
    }
});
