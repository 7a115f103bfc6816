//! # Sponge Log
//!
//! Append-only record log with a durable read cursor, used by Sponge as the
//! last tier of its overflow buffer.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Sponge.**
//!
//! Users should depend on the main `sponge` crate instead, which provides
//! the stable public API. This crate's API may change without notice
//! between minor versions.

// Append-only log backends for the Sponge overflow buffer
// Frames are self-delimiting; no index is kept beside the data

use serde::{Deserialize, Serialize};
use sponge_core::Result;

pub mod cursor;
pub mod file;
pub mod memory;

pub use cursor::CursorFile;
pub use file::FileLog;
pub use memory::MemoryLog;

/// Name of the append-only data file inside the storage directory
pub const DATA_FILE_NAME: &str = "dataFile.data";

/// Name of the 8-byte read cursor file inside the storage directory
pub const CURSOR_FILE_NAME: &str = "fetchPositionFile.data";

/// Sync mode for log appends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Call fsync after every batch (strongest durability)
    #[default]
    Sync,
    /// No fsync on append (fastest, unsafe for power loss)
    None,
}

/// Storage behind the staging engine.
///
/// A backend holds concatenated frames and hands them back one at a time
/// from its read position. Read and write positions are byte offsets into
/// the log; the read position never passes the write position.
pub trait LogBackend: Send {
    /// Append a batch of whole frames at the write position.
    fn append(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read the frame at the read position and advance past it.
    ///
    /// Returns `Ok(None)` when the read position has reached the end of
    /// the log. The returned bytes include the frame header.
    fn read_next(&mut self) -> Result<Option<Vec<u8>>>;

    /// Offset of the next unread frame
    fn read_position(&self) -> u64;

    /// Offset where the next batch is appended
    fn write_position(&self) -> u64;

    /// Whether any appended frame has not been read yet
    fn has_unread(&self) -> bool {
        self.read_position() < self.write_position()
    }

    /// Whether unread frames were already present when the backend was opened
    fn had_unread_at_open(&self) -> bool;

    /// Drop all storage once everything has been read.
    ///
    /// Does nothing (returns `Ok(false)`) when the read position is still
    /// zero or unread frames remain.
    fn release(&mut self) -> Result<bool>;

    /// Tear the backend down; later I/O fails with `Error::Closed`.
    fn close(&mut self) -> Result<()>;

    /// Whether [`close`](LogBackend::close) has run
    fn is_closed(&self) -> bool;
}
