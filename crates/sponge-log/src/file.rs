// File-backed log - one append-only data file plus a cursor file
//
// Read and write offsets are tracked as explicit values and passed into
// every I/O call; the file handle's own seek position is never relied on.
// The write offset always equals the data file length.

use crate::cursor::CursorFile;
use crate::{LogBackend, SyncMode, CURSOR_FILE_NAME, DATA_FILE_NAME};
use sponge_core::frame::{self, HEADER_LEN};
use sponge_core::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Append-only data file with a durable read cursor
pub struct FileLog {
    dir: PathBuf,
    data_path: PathBuf,
    data: Option<File>,
    cursor: Option<CursorFile>,
    read_pos: u64,
    write_pos: u64,
    sync_mode: SyncMode,
    had_unread_at_open: bool,
}

impl FileLog {
    /// Open (or create) the log stored in `dir`.
    ///
    /// Restores the read cursor, resets a cursor that points past the end
    /// of the data file, and cuts off a frame left half-written by a crash.
    pub fn open(dir: impl AsRef<Path>, sync_mode: SyncMode) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("Failed to create log directory {:?}: {}", dir, e)))?;

        let data_path = dir.join(DATA_FILE_NAME);
        let data = open_data_file(&data_path)?;
        let write_pos = data.metadata()?.len();

        let mut cursor = CursorFile::open(dir.join(CURSOR_FILE_NAME))?;
        let mut read_pos = cursor.load()?;
        if read_pos > write_pos {
            // Left over from a reclamation interrupted between deleting the
            // data file and rewriting the cursor
            warn!(read_pos, write_pos, "Cursor past end of data file, resetting to 0");
            read_pos = 0;
            cursor.store(0)?;
        }

        let mut log = Self {
            dir,
            data_path,
            data: Some(data),
            cursor: Some(cursor),
            read_pos,
            write_pos,
            sync_mode,
            had_unread_at_open: false,
        };

        log.repair_tail()?;
        log.had_unread_at_open = log.read_pos < log.write_pos;

        info!(
            dir = ?log.dir,
            read_pos = log.read_pos,
            write_pos = log.write_pos,
            unread = log.had_unread_at_open,
            "Opened overflow log"
        );

        Ok(log)
    }

    /// Walk frame headers from the read cursor and truncate a torn tail.
    fn repair_tail(&mut self) -> Result<()> {
        let end = self.write_pos;
        let mut pos = self.read_pos;
        let mut header = [0u8; HEADER_LEN];

        let file = self.data.as_mut().ok_or(Error::Closed)?;
        while end - pos >= HEADER_LEN as u64 {
            read_exact_at(file, pos, &mut header)
                .map_err(|e| Error::Storage(format!("Failed to scan log at {}: {}", pos, e)))?;

            let len = match frame::decode_len(&header) {
                Ok(len) => len as u64,
                Err(e) => {
                    warn!(offset = pos, error = %e, "Invalid frame header in log tail");
                    break;
                }
            };
            if len > end - pos {
                break;
            }
            pos += len;
        }

        if pos < end {
            warn!(
                valid_until = pos,
                file_len = end,
                "Truncating incomplete frame at end of log"
            );
            file.set_len(pos)?;
            file.sync_all()?;
            self.write_pos = pos;
        }

        Ok(())
    }

    fn data_file(&mut self) -> Result<&mut File> {
        self.data.as_mut().ok_or(Error::Closed)
    }

    fn cursor_file(&mut self) -> Result<&mut CursorFile> {
        self.cursor.as_mut().ok_or(Error::Closed)
    }

    /// Directory holding the data and cursor files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the append-only data file
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Path of the cursor file
    pub fn cursor_path(&self) -> PathBuf {
        self.dir.join(CURSOR_FILE_NAME)
    }

    /// Sync mode used for appends
    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }
}

impl LogBackend for FileLog {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let offset = self.write_pos;
        let sync_mode = self.sync_mode;
        let file = self.data_file()?;

        let result = write_all_at(file, offset, bytes).and_then(|()| match sync_mode {
            SyncMode::Sync => file.sync_all(),
            SyncMode::None => Ok(()),
        });

        if let Err(e) = result {
            // Never leave a partial batch behind the write offset
            if let Err(trunc) = file.set_len(offset) {
                warn!(offset, error = %trunc, "Failed to roll back partial append");
            }
            return Err(Error::Storage(format!(
                "Failed to append {} bytes at offset {}: {}",
                bytes.len(),
                offset,
                e
            )));
        }

        self.write_pos = offset + bytes.len() as u64;
        debug!(
            bytes = bytes.len(),
            offset,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Appended batch to overflow log"
        );

        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Vec<u8>>> {
        let offset = self.read_pos;
        let end = self.write_pos;
        if offset >= end {
            return Ok(None);
        }

        let remaining = end - offset;
        let file = self.data_file()?;

        let mut header = [0u8; HEADER_LEN];
        if remaining < HEADER_LEN as u64 {
            return Err(Error::Corrupt(format!(
                "{} trailing bytes at offset {} cannot hold a header",
                remaining, offset
            )));
        }
        read_exact_at(file, offset, &mut header)
            .map_err(|e| Error::Storage(format!("Failed to read header at {}: {}", offset, e)))?;

        let len = frame::decode_len(&header)?;
        if len as u64 > remaining {
            return Err(Error::Corrupt(format!(
                "frame at offset {} needs {} bytes, {} remain",
                offset, len, remaining
            )));
        }

        let mut record = vec![0u8; len];
        record[..HEADER_LEN].copy_from_slice(&header);
        read_exact_at(file, offset + HEADER_LEN as u64, &mut record[HEADER_LEN..])
            .map_err(|e| Error::Storage(format!("Failed to read frame at {}: {}", offset, e)))?;

        let next = offset + len as u64;
        self.cursor_file()?.store(next)?;
        self.read_pos = next;

        Ok(Some(record))
    }

    fn read_position(&self) -> u64 {
        self.read_pos
    }

    fn write_position(&self) -> u64 {
        self.write_pos
    }

    fn had_unread_at_open(&self) -> bool {
        self.had_unread_at_open
    }

    fn release(&mut self) -> Result<bool> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.read_pos == 0 || self.has_unread() {
            return Ok(false);
        }

        let reclaimed = self.write_pos;

        // The current handle stays in service until the fresh file and the
        // cursor reset are both in place
        if let Err(e) = fs::remove_file(&self.data_path) {
            if e.kind() != io::ErrorKind::NotFound {
                return Err(Error::Storage(format!(
                    "Failed to delete data file {:?}: {}",
                    self.data_path, e
                )));
            }
        }
        let fresh = open_data_file(&self.data_path)?;
        self.cursor_file()?.store(0)?;

        self.data = Some(fresh);
        self.read_pos = 0;
        self.write_pos = 0;

        info!(dir = ?self.dir, reclaimed_bytes = reclaimed, "Reclaimed overflow log");
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        self.cursor = None;
        if let Some(file) = self.data.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.data.is_none()
    }
}

impl Drop for FileLog {
    fn drop(&mut self) {
        // Best effort sync on drop
        if let Some(file) = &self.data {
            let _ = file.sync_all();
        }
    }
}

fn open_data_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::Storage(format!("Failed to open data file {:?}: {}", path, e)))
}

fn read_exact_at(file: &mut File, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

fn write_all_at(file: &mut File, offset: u64, buf: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sponge_core::frame::encode;
    use tempfile::TempDir;

    fn setup_test_log() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log_path = temp_dir.path().join("sponge");
        (temp_dir, log_path)
    }

    fn record(i: u32) -> Vec<u8> {
        encode([0, 1], format!("task-{}", i).as_bytes()).unwrap()
    }

    #[test]
    fn test_open_creates_files() {
        let (_temp_dir, log_path) = setup_test_log();

        let log = FileLog::open(&log_path, SyncMode::Sync).expect("Failed to open log");

        assert!(log.data_path().exists());
        assert!(log.cursor_path().exists());
        assert_eq!(log.read_position(), 0);
        assert_eq!(log.write_position(), 0);
        assert!(!log.had_unread_at_open());
    }

    #[test]
    fn test_append_and_read_header_inclusive() {
        let (_temp_dir, log_path) = setup_test_log();
        let mut log = FileLog::open(&log_path, SyncMode::Sync).expect("Failed to open log");

        let mut batch = record(1);
        batch.extend(record(2));
        log.append(&batch).expect("Failed to append");

        assert_eq!(log.write_position(), batch.len() as u64);
        assert_eq!(log.read_next().unwrap(), Some(record(1)));
        assert_eq!(log.read_next().unwrap(), Some(record(2)));
        assert_eq!(log.read_next().unwrap(), None);
        assert!(!log.has_unread());
    }

    #[test]
    fn test_read_persists_cursor() {
        let (_temp_dir, log_path) = setup_test_log();
        let mut log = FileLog::open(&log_path, SyncMode::Sync).expect("Failed to open log");

        log.append(&record(1)).unwrap();
        log.read_next().unwrap();

        let stored = fs::read(log.cursor_path()).unwrap();
        assert_eq!(stored, (record(1).len() as u64).to_be_bytes());
    }

    #[test]
    fn test_append_empty_batch_is_noop() {
        let (_temp_dir, log_path) = setup_test_log();
        let mut log = FileLog::open(&log_path, SyncMode::None).expect("Failed to open log");

        log.append(&[]).unwrap();
        assert_eq!(log.write_position(), 0);
    }

    #[test]
    fn test_corrupt_header_is_an_error() {
        let (_temp_dir, log_path) = setup_test_log();
        let mut log = FileLog::open(&log_path, SyncMode::Sync).expect("Failed to open log");

        // Appends are trusted; a bad length only shows up on read
        log.append(&[0, 0, 0, 0, 0, 1, 9, 9]).unwrap();
        assert!(matches!(log.read_next(), Err(Error::Corrupt(_))));
        assert_eq!(log.read_position(), 0);
    }

    #[test]
    fn test_release_requires_fully_read_log() {
        let (_temp_dir, log_path) = setup_test_log();
        let mut log = FileLog::open(&log_path, SyncMode::Sync).expect("Failed to open log");

        // Nothing read yet
        assert!(!log.release().unwrap());

        log.append(&record(1)).unwrap();
        log.append(&record(2)).unwrap();
        log.read_next().unwrap();

        // One record still unread
        assert!(!log.release().unwrap());

        log.read_next().unwrap();
        assert!(log.release().unwrap());
        assert_eq!(log.read_position(), 0);
        assert_eq!(log.write_position(), 0);
        assert_eq!(fs::metadata(log.data_path()).unwrap().len(), 0);
        assert_eq!(fs::read(log.cursor_path()).unwrap(), 0u64.to_be_bytes());

        // Log keeps working after reclamation
        log.append(&record(3)).unwrap();
        assert_eq!(log.read_next().unwrap(), Some(record(3)));
    }

    #[test]
    fn test_failed_release_keeps_log_usable() {
        let (_temp_dir, log_path) = setup_test_log();
        let mut log = FileLog::open(&log_path, SyncMode::None).expect("Failed to open log");
        assert_eq!(log.sync_mode(), SyncMode::None);

        log.append(&record(1)).unwrap();
        log.read_next().unwrap();

        // A directory squatting on the data path cannot be unlinked
        fs::remove_file(log.data_path()).unwrap();
        fs::create_dir(log.data_path()).unwrap();
        fs::write(log.data_path().join("blocker"), b"x").unwrap();

        assert!(matches!(log.release(), Err(Error::Storage(_))));
        assert!(!log.is_closed());
        assert_eq!(log.read_position(), record(1).len() as u64);

        log.append(&record(2)).unwrap();
        assert_eq!(log.read_next().unwrap(), Some(record(2)));
    }

    #[test]
    fn test_close_rejects_io() {
        let (_temp_dir, log_path) = setup_test_log();
        let mut log = FileLog::open(&log_path, SyncMode::Sync).expect("Failed to open log");
        log.append(&record(1)).unwrap();

        log.close().expect("Failed to close");
        assert!(log.is_closed());
        assert!(matches!(log.append(&record(2)), Err(Error::Closed)));
        assert!(matches!(log.read_next(), Err(Error::Closed)));
        assert!(matches!(log.release(), Err(Error::Closed)));

        // Closing twice is harmless
        log.close().expect("Second close failed");
    }
}
