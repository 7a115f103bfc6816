// Restart and crash scenario tests for the file log

mod common;

use common::{task, LogTestFixture};
use sponge_log::{FileLog, LogBackend, SyncMode, CURSOR_FILE_NAME, DATA_FILE_NAME};
use std::fs::{self, OpenOptions};
use std::io::Write;

#[test]
fn test_unread_records_survive_restart() {
    let fixture = LogTestFixture::new();

    {
        let mut log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to open log");
        let batch: Vec<u8> = (0..5).flat_map(task).collect();
        log.append(&batch).expect("Failed to append");
    }

    let mut log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to reopen log");
    assert!(log.had_unread_at_open());

    for i in 0..5 {
        assert_eq!(log.read_next().unwrap(), Some(task(i)));
    }
    assert_eq!(log.read_next().unwrap(), None);
}

#[test]
fn test_cursor_survives_restart() {
    let fixture = LogTestFixture::new();

    {
        let mut log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to open log");
        let batch: Vec<u8> = (0..3).flat_map(task).collect();
        log.append(&batch).unwrap();
        assert_eq!(log.read_next().unwrap(), Some(task(0)));
    }

    let mut log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to reopen log");
    assert!(log.had_unread_at_open());
    assert_eq!(log.read_position(), task(0).len() as u64);
    assert_eq!(log.read_next().unwrap(), Some(task(1)));
}

#[test]
fn test_fully_read_log_reports_no_backlog() {
    let fixture = LogTestFixture::new();

    {
        let mut log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to open log");
        log.append(&task(0)).unwrap();
        log.read_next().unwrap();
    }

    let log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to reopen log");
    assert!(!log.had_unread_at_open());
}

#[test]
fn test_torn_tail_is_truncated() {
    let fixture = LogTestFixture::new();

    {
        let mut log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to open log");
        log.append(&[task(0), task(1)].concat()).unwrap();
    }

    // Simulate a crash halfway through the next batch
    let complete = fixture.data_len();
    let torn = task(2);
    let mut file = OpenOptions::new()
        .append(true)
        .open(fixture.log_dir().join(DATA_FILE_NAME))
        .unwrap();
    file.write_all(&torn[..torn.len() - 3]).unwrap();
    drop(file);

    let mut log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to reopen log");
    assert_eq!(log.write_position(), complete);
    assert_eq!(fixture.data_len(), complete);

    log.append(&task(3)).unwrap();
    assert_eq!(log.read_next().unwrap(), Some(task(0)));
    assert_eq!(log.read_next().unwrap(), Some(task(1)));
    assert_eq!(log.read_next().unwrap(), Some(task(3)));
}

#[test]
fn test_cursor_past_end_is_reset() {
    let fixture = LogTestFixture::new();

    // Reclamation interrupted after the data file was deleted
    fs::write(fixture.log_dir().join(CURSOR_FILE_NAME), 4096u64.to_be_bytes()).unwrap();

    let log = FileLog::open(fixture.log_dir(), SyncMode::Sync).expect("Failed to open log");
    assert_eq!(log.read_position(), 0);
    assert!(!log.had_unread_at_open());
    assert_eq!(
        fs::read(fixture.log_dir().join(CURSOR_FILE_NAME)).unwrap(),
        0u64.to_be_bytes()
    );
}

#[test]
fn test_missing_directory_is_created() {
    let fixture = LogTestFixture::new();
    let nested = fixture.log_dir().join("a").join("b");

    let log = FileLog::open(&nested, SyncMode::Sync).expect("Failed to open log");
    assert!(nested.join(DATA_FILE_NAME).exists());
    assert_eq!(log.dir(), nested.as_path());
}
