// In-memory log backend
//
// Same frame arithmetic as the file log over a growable buffer. Nothing
// survives the process; useful for tests and for queues that only want
// the staging and ordering behaviour.

use crate::LogBackend;
use sponge_core::frame;
use sponge_core::{Error, Result};

/// Log backend that keeps appended frames in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    data: Vec<u8>,
    read_pos: usize,
    closed: bool,
}

impl MemoryLog {
    /// Create an empty in-memory log
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held, read or not
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been appended since creation or the last release
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl LogBackend for MemoryLog {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(Error::Closed);
        }
        match frame::frame_at(&self.data, self.read_pos)? {
            Some(record) => {
                let record = record.to_vec();
                self.read_pos += record.len();
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn read_position(&self) -> u64 {
        self.read_pos as u64
    }

    fn write_position(&self) -> u64 {
        self.data.len() as u64
    }

    fn had_unread_at_open(&self) -> bool {
        false
    }

    fn release(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.read_pos == 0 || self.has_unread() {
            return Ok(false);
        }
        self.data = Vec::new();
        self.read_pos = 0;
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
