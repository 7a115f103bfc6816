// Common test utilities for overflow log integration tests

use sponge_core::frame;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture that creates a temporary log directory
pub struct LogTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub log_path: PathBuf,
}

impl LogTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log_path = temp_dir.path().join("sponge");
        fs::create_dir_all(&log_path).expect("Failed to create log directory");

        Self { temp_dir, log_path }
    }

    pub fn log_dir(&self) -> &PathBuf {
        &self.log_path
    }

    #[allow(dead_code)]
    pub fn data_len(&self) -> u64 {
        fs::metadata(self.log_path.join(sponge_log::DATA_FILE_NAME))
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

impl Default for LogTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame carrying `task-{i}` as payload
#[allow(dead_code)]
pub fn task(i: usize) -> Vec<u8> {
    frame::encode([0x5A, 0x01], format!("task-{}", i).as_bytes()).expect("Failed to encode")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_log_dir() {
        let fixture = LogTestFixture::new();
        assert!(fixture.log_dir().exists());
        assert!(fixture.log_dir().is_dir());
    }
}
