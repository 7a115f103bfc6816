//! Construction parameters for the overflow buffer and its queue.

use serde::{Deserialize, Serialize};
use sponge_core::{Error, Result};
use sponge_log::SyncMode;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Key naming the storage directory
pub const KEY_DIR: &str = "dir";
/// Key for the external queue capacity
pub const KEY_CAPACITY: &str = "capacity";
/// Key for the number of records spilled per overflow cycle
pub const KEY_PERSIST_LIMIT: &str = "oncePersistLimit";
/// Key for the staging memory budget in bytes
pub const KEY_MAX_MEMORY_BYTES: &str = "maxByteArraySize";
/// Key for the number of records flushed per batch
pub const KEY_BATCH_WRITE_COUNT: &str = "oneBatchWriteCnt";
/// Key for the idle reclamation timeout in milliseconds
pub const KEY_IDLE_RELEASE_MS: &str = "canReleaseResMaxTime";
/// Key for the append sync mode (`sync` or `none`)
pub const KEY_SYNC_MODE: &str = "syncMode";

/// Default external queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;
/// Default records spilled per overflow cycle
pub const DEFAULT_PERSIST_LIMIT: usize = 100;
/// Default staging memory budget (50 MiB)
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 50 * 1024 * 1024;
/// Default records flushed per batch
pub const DEFAULT_BATCH_WRITE_COUNT: usize = 20;
/// Default idle time before disk space is reclaimed
pub const DEFAULT_IDLE_RELEASE_MS: u64 = 60 * 1000;

/// Overflow buffer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpongeConfig {
    /// Directory for the data and cursor files; required for the file backend
    pub dir: Option<PathBuf>,
    /// Capacity of the in-memory queue that overflows into this buffer
    pub queue_capacity: usize,
    /// Records moved to persistence per overflow cycle
    pub persist_limit: usize,
    /// Maximum bytes held in the staging list
    pub max_memory_bytes: u64,
    /// Maximum records flushed to disk per cycle
    pub batch_write_count: usize,
    /// Milliseconds of emptiness before the disk log is reclaimed
    pub idle_release_timeout_ms: u64,
    /// Whether batches are fsynced
    pub sync_mode: SyncMode,
}

impl Default for SpongeConfig {
    fn default() -> Self {
        Self {
            dir: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            persist_limit: DEFAULT_PERSIST_LIMIT,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            batch_write_count: DEFAULT_BATCH_WRITE_COUNT,
            idle_release_timeout_ms: DEFAULT_IDLE_RELEASE_MS,
            sync_mode: SyncMode::Sync,
        }
    }
}

impl SpongeConfig {
    /// Defaults with the given storage directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Build a configuration from string key/value pairs.
    ///
    /// Missing keys keep their defaults; see the `KEY_*` constants for the
    /// accepted names. Unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = map.get(KEY_DIR) {
            let dir = dir.trim();
            if !dir.is_empty() {
                config.dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(value) = parse_key(map, KEY_CAPACITY)? {
            config.queue_capacity = value;
        }
        if let Some(value) = parse_key(map, KEY_PERSIST_LIMIT)? {
            config.persist_limit = value;
        }
        if let Some(value) = parse_key(map, KEY_MAX_MEMORY_BYTES)? {
            config.max_memory_bytes = value;
        }
        if let Some(value) = parse_key(map, KEY_BATCH_WRITE_COUNT)? {
            config.batch_write_count = value;
        }
        if let Some(value) = parse_key(map, KEY_IDLE_RELEASE_MS)? {
            config.idle_release_timeout_ms = value;
        }
        if let Some(value) = map.get(KEY_SYNC_MODE) {
            config.sync_mode = match value.trim().to_ascii_lowercase().as_str() {
                "sync" => SyncMode::Sync,
                "none" => SyncMode::None,
                other => {
                    return Err(Error::Config(format!(
                        "{} must be 'sync' or 'none', got '{}'",
                        KEY_SYNC_MODE, other
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Set the storage directory
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Set the staging memory budget in bytes
    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Set the number of records flushed per batch
    pub fn with_batch_write_count(mut self, count: usize) -> Self {
        self.batch_write_count = count;
        self
    }

    /// Set the idle reclamation timeout
    pub fn with_idle_release_timeout(mut self, timeout: Duration) -> Self {
        self.idle_release_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the queue capacity and per-cycle persist limit
    pub fn with_queue(mut self, capacity: usize, persist_limit: usize) -> Self {
        self.queue_capacity = capacity;
        self.persist_limit = persist_limit;
        self
    }

    /// Set the append sync mode
    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Idle reclamation timeout as a `Duration`
    pub fn idle_release_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_release_timeout_ms)
    }

    /// Check every parameter the file-backed engine needs.
    pub fn validate(&self) -> Result<()> {
        if self.dir.is_none() {
            return Err(Error::Config(format!(
                "storage directory ('{}') is required",
                KEY_DIR
            )));
        }
        self.validate_engine()?;
        self.validate_queue()
    }

    /// Limits used by the staging engine, independent of the backend.
    pub(crate) fn validate_engine(&self) -> Result<()> {
        if self.max_memory_bytes == 0 {
            return Err(Error::Config("memory budget must be positive".to_string()));
        }
        if self.batch_write_count == 0 {
            return Err(Error::Config("batch write count must be positive".to_string()));
        }
        Ok(())
    }

    /// Limits used by the queue integration.
    pub(crate) fn validate_queue(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be positive".to_string()));
        }
        if self.persist_limit == 0 {
            return Err(Error::Config("persist limit must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_key<T: FromStr>(map: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match map.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value '{}' for {}: {}", raw, key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = SpongeConfig::default();
        assert_eq!(config.dir, None);
        assert_eq!(config.queue_capacity, 500);
        assert_eq!(config.persist_limit, 100);
        assert_eq!(config.max_memory_bytes, 50 * 1024 * 1024);
        assert_eq!(config.batch_write_count, 20);
        assert_eq!(config.idle_release_timeout(), Duration::from_secs(60));
        assert_eq!(config.sync_mode, SyncMode::Sync);
    }

    #[test]
    fn test_from_map_overrides() {
        let config = SpongeConfig::from_map(&map(&[
            (KEY_DIR, "/var/spool/tasks"),
            (KEY_CAPACITY, "64"),
            (KEY_PERSIST_LIMIT, "8"),
            (KEY_MAX_MEMORY_BYTES, "4096"),
            (KEY_BATCH_WRITE_COUNT, "4"),
            (KEY_IDLE_RELEASE_MS, "250"),
            (KEY_SYNC_MODE, "None"),
        ]))
        .expect("Failed to parse config");

        assert_eq!(config.dir, Some(PathBuf::from("/var/spool/tasks")));
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.persist_limit, 8);
        assert_eq!(config.max_memory_bytes, 4096);
        assert_eq!(config.batch_write_count, 4);
        assert_eq!(config.idle_release_timeout_ms, 250);
        assert_eq!(config.sync_mode, SyncMode::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_map_keeps_defaults() {
        let config = SpongeConfig::from_map(&map(&[(KEY_DIR, "data")])).unwrap();
        assert_eq!(config, SpongeConfig::new("data"));
    }

    #[test]
    fn test_from_map_rejects_bad_numbers() {
        let err = SpongeConfig::from_map(&map(&[(KEY_CAPACITY, "lots")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = SpongeConfig::from_map(&map(&[(KEY_SYNC_MODE, "sometimes")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_requires_dir() {
        let err = SpongeConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("dir")));

        let empty_dir = SpongeConfig::from_map(&map(&[(KEY_DIR, "  ")])).unwrap();
        assert!(empty_dir.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(SpongeConfig::new("d").with_max_memory_bytes(0).validate().is_err());
        assert!(SpongeConfig::new("d").with_batch_write_count(0).validate().is_err());
        assert!(SpongeConfig::new("d").with_queue(0, 10).validate().is_err());
        assert!(SpongeConfig::new("d").with_queue(10, 0).validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = SpongeConfig::default()
            .with_dir("spool")
            .with_idle_release_timeout(Duration::from_millis(1500))
            .with_sync_mode(SyncMode::None);

        assert_eq!(config.dir, Some(PathBuf::from("spool")));
        assert_eq!(config.idle_release_timeout_ms, 1500);
        assert_eq!(config.sync_mode, SyncMode::None);
    }
}
