// Durable read cursor - a fixed 8-byte big-endian offset
//
// The cursor is rewritten in place and fsynced after every read, so a
// restart resumes exactly after the last record handed out.

use sponge_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Size of the cursor file in bytes
pub const CURSOR_LEN: u64 = 8;

/// Fixed-size file holding the persisted read offset of a log
pub struct CursorFile {
    path: PathBuf,
    file: File,
}

impl CursorFile {
    /// Open or create the cursor file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Storage(format!("Failed to open cursor file {:?}: {}", path, e)))?;

        Ok(Self { path, file })
    }

    /// Read the persisted offset.
    ///
    /// A new (empty) file reads as 0. A file of any other length than
    /// [`CURSOR_LEN`] is treated the same way, with a warning.
    pub fn load(&mut self) -> Result<u64> {
        let len = self.file.metadata()?.len();
        if len == 0 {
            return Ok(0);
        }
        if len != CURSOR_LEN {
            warn!(path = ?self.path, len, "Ignoring malformed cursor file");
            return Ok(0);
        }

        let mut buf = [0u8; CURSOR_LEN as usize];
        self.file.seek(SeekFrom::Start(0))?;
        self.file
            .read_exact(&mut buf)
            .map_err(|e| Error::Storage(format!("Failed to read cursor: {}", e)))?;

        Ok(u64::from_be_bytes(buf))
    }

    /// Overwrite the persisted offset and fsync.
    pub fn store(&mut self, position: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file
            .write_all(&position.to_be_bytes())
            .map_err(|e| Error::Storage(format!("Failed to write cursor: {}", e)))?;
        self.file
            .sync_all()
            .map_err(|e| Error::Storage(format!("Failed to sync cursor: {}", e)))?;

        Ok(())
    }

    /// Path of the cursor file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
