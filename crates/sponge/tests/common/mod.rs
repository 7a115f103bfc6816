// Common test utilities for overflow buffer integration tests

use sponge::{frame, Persistence, SpongeConfig};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Test fixture that creates a temporary spool directory
pub struct SpongeTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub spool_path: PathBuf,
}

impl SpongeTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let spool_path = temp_dir.path().join("spool");
        fs::create_dir_all(&spool_path).expect("Failed to create spool directory");

        Self {
            temp_dir,
            spool_path,
        }
    }

    pub fn spool_dir(&self) -> &PathBuf {
        &self.spool_path
    }

    /// Defaults pointed at the spool directory
    pub fn config(&self) -> SpongeConfig {
        SpongeConfig::new(&self.spool_path)
    }

    #[allow(dead_code)]
    pub fn file_len(&self, name: &str) -> u64 {
        fs::metadata(self.spool_path.join(name))
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

impl Default for SpongeTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame carrying `task-{i}` as payload
#[allow(dead_code)]
pub fn task(i: usize) -> Vec<u8> {
    frame::encode([0x5A, 0x01], format!("task-{}", i).as_bytes()).expect("Failed to encode")
}

/// Fetch until the buffer reports empty
#[allow(dead_code)]
pub fn drain(persistence: &dyn Persistence) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    while let Some(record) = persistence
        .fetch_data_from_persistence()
        .expect("Failed to fetch")
    {
        records.push(record);
    }
    records
}

/// Poll `cond` until it holds or `timeout` passes
#[allow(dead_code)]
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_spool_dir() {
        let fixture = SpongeTestFixture::new();
        assert!(fixture.spool_dir().is_dir());
        assert_eq!(fixture.config().dir.as_ref(), Some(fixture.spool_dir()));
    }
}
