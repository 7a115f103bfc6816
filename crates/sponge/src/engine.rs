//! Staging buffer engine
//!
//! Producers append records to an in-memory staging list. A dedicated
//! flush thread moves them, a batch at a time, into the log backend.
//! Readers pull records back in submission order by consulting three
//! tiers, oldest first:
//!
//! 1. the log backend (flushed records),
//! 2. the write batch (records taken from staging but not yet on disk),
//! 3. the staging list itself.
//!
//! Two locks guard the state. The io lock covers the write batch and all
//! backend I/O; the staging lock covers the staging list and its byte
//! count. Whenever both are held, io is taken first.

use crate::config::SpongeConfig;
use sponge_core::frame;
use sponge_core::{Error, Persistence, Result};
use sponge_log::{FileLog, LogBackend};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Name given to the background flush thread
pub const FLUSH_THREAD_NAME: &str = "sponge-flush";

/// Health of the flush pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHealth {
    /// The flush thread is running
    Running,
    /// The flush thread stopped; new records are no longer made durable
    Failed {
        /// Error that stopped the flush thread
        reason: String,
    },
}

/// Point-in-time view of the engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Records currently in the staging list
    pub staged_records: usize,
    /// Bytes currently in the staging list
    pub staged_bytes: u64,
    /// Records admitted by `persist_data`
    pub accepted: u64,
    /// Records dropped because the memory budget was exhausted
    pub dropped: u64,
    /// Records rejected because their frame was malformed
    pub rejected: u64,
    /// Batches appended to the log
    pub flushed_batches: u64,
    /// Bytes appended to the log
    pub flushed_bytes: u64,
    /// Records fetched from the log
    pub fetched_from_log: u64,
    /// Records fetched from the write batch
    pub fetched_from_batch: u64,
    /// Records fetched from the staging list
    pub fetched_from_staging: u64,
    /// Times the log storage was reclaimed
    pub reclamations: u64,
    /// Read offset of the log
    pub log_read_position: u64,
    /// Write offset of the log
    pub log_write_position: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    flushed_batches: AtomicU64,
    flushed_bytes: AtomicU64,
    fetched_from_log: AtomicU64,
    fetched_from_batch: AtomicU64,
    fetched_from_staging: AtomicU64,
    reclamations: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Records waiting for the flush thread
#[derive(Default)]
struct Staging {
    records: VecDeque<Vec<u8>>,
    bytes: u64,
    shutdown: bool,
}

impl Staging {
    fn pop_front(&mut self) -> Option<Vec<u8>> {
        let record = self.records.pop_front()?;
        self.bytes -= record.len() as u64;
        Some(record)
    }
}

/// Concatenated records taken from staging in one flush cycle.
///
/// `offset` marks how much of the batch readers already consumed; only
/// the remainder is handed to the log.
#[derive(Default)]
struct WriteBatch {
    buf: Vec<u8>,
    offset: usize,
}

impl WriteBatch {
    fn push(&mut self, record: &[u8]) {
        self.buf.extend_from_slice(record);
    }

    fn pending(&self) -> &[u8] {
        &self.buf[self.offset..]
    }

    fn is_drained(&self) -> bool {
        self.offset >= self.buf.len()
    }

    fn take_front(&mut self) -> Result<Option<Vec<u8>>> {
        let record = match frame::frame_at(&self.buf, self.offset)? {
            Some(record) => record.to_vec(),
            None => return Ok(None),
        };
        self.offset += record.len();
        Ok(Some(record))
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.offset = 0;
    }
}

struct IoState<L> {
    batch: WriteBatch,
    log: L,
}

struct Shared<L> {
    staging: Mutex<Staging>,
    staged: Condvar,
    io: Mutex<IoState<L>>,
    /// Start of the current idle window, if every tier was last seen empty
    idle_since: Mutex<Option<Instant>>,
    health: Mutex<EngineHealth>,
    counters: Counters,
    max_memory_bytes: u64,
    batch_write_count: usize,
    idle_release_timeout: Duration,
}

impl<L: LogBackend> Shared<L> {
    fn new(log: L, config: &SpongeConfig) -> Self {
        Self {
            staging: Mutex::new(Staging::default()),
            staged: Condvar::new(),
            io: Mutex::new(IoState {
                batch: WriteBatch::default(),
                log,
            }),
            idle_since: Mutex::new(None),
            health: Mutex::new(EngineHealth::Running),
            counters: Counters::default(),
            max_memory_bytes: config.max_memory_bytes,
            batch_write_count: config.batch_write_count,
            idle_release_timeout: config.idle_release_timeout(),
        }
    }

    fn run_flusher(&self) {
        loop {
            match self.flush_once() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!(
                        error = %e,
                        "Flush thread stopped; overflowed records are no longer persisted"
                    );
                    self.fail(e.to_string());
                    self.teardown();
                    break;
                }
            }
        }
        debug!("Flush thread exiting");
    }

    /// Wait for staged records and move one batch into the log.
    ///
    /// Returns `Ok(false)` once shutdown was requested and nothing is left.
    fn flush_once(&self) -> Result<bool> {
        {
            let mut staging = self.staging.lock()?;
            while staging.records.is_empty() && !staging.shutdown {
                staging = self.staged.wait(staging)?;
            }
            if staging.records.is_empty() {
                return Ok(false);
            }
        }

        let mut io = self.io.lock()?;
        let IoState { batch, log } = &mut *io;
        {
            let mut staging = self.staging.lock()?;
            for _ in 0..self.batch_write_count {
                match staging.pop_front() {
                    Some(record) => batch.push(&record),
                    None => break,
                }
            }
        }

        if batch.is_drained() {
            // Readers emptied the staging list between the wait and the drain
            batch.clear();
            return Ok(true);
        }

        let pending = batch.pending().len() as u64;
        log.append(batch.pending())?;
        batch.clear();

        Counters::bump(&self.counters.flushed_batches, 1);
        Counters::bump(&self.counters.flushed_bytes, pending);
        Ok(true)
    }

    fn fail(&self, reason: String) {
        if let Ok(mut health) = self.health.lock() {
            *health = EngineHealth::Failed { reason };
        }
    }

    fn teardown(&self) {
        match self.io.lock() {
            Ok(mut io) => {
                if let Err(e) = io.log.close() {
                    warn!(error = %e, "Failed to close overflow log");
                }
            }
            Err(_) => warn!("io lock poisoned during teardown"),
        }
    }

    fn mark_busy(&self) {
        if let Ok(mut idle) = self.idle_since.lock() {
            *idle = None;
        }
    }

    fn mark_idle(&self) {
        if let Ok(mut idle) = self.idle_since.lock() {
            idle.get_or_insert_with(Instant::now);
        }
    }

    /// Run reclamation if the idle window has outlasted the timeout.
    fn maybe_reclaim(&self) {
        let due = match self.idle_since.lock() {
            Ok(mut idle) => match *idle {
                Some(since) if since.elapsed() > self.idle_release_timeout => {
                    *idle = None;
                    true
                }
                _ => false,
            },
            Err(_) => false,
        };

        if due {
            if let Err(e) = self.reclaim() {
                error!(error = %e, "Failed to reclaim overflow log");
            }
        }
    }

    fn reclaim(&self) -> Result<bool> {
        let mut io = self.io.lock()?;
        // Records flushed after the idle window opened must survive
        if io.log.is_closed() || !io.batch.is_drained() || io.log.has_unread() {
            return Ok(false);
        }

        let released = io.log.release()?;
        if released {
            Counters::bump(&self.counters.reclamations, 1);
        }
        Ok(released)
    }
}

/// Bounded overflow buffer: staging list, flush thread and log backend.
///
/// Dropping the engine flushes whatever is still staged, stops the flush
/// thread and closes the backend.
///
/// # Examples
///
/// ```rust,no_run
/// use sponge::{frame, Persistence, SpongeConfig, SpongeEngine};
///
/// let engine = SpongeEngine::open(&SpongeConfig::new("./spool"))?;
/// assert!(engine.persist_data(frame::encode([0, 1], b"task")?));
///
/// while let Some(record) = engine.fetch_data_from_persistence()? {
///     println!("{:?}", frame::payload(&record));
/// }
/// # Ok::<(), sponge::Error>(())
/// ```
pub struct SpongeEngine<L: LogBackend + 'static = FileLog> {
    shared: Arc<Shared<L>>,
    flusher: Option<JoinHandle<()>>,
    had_unread_at_open: bool,
}

impl SpongeEngine<FileLog> {
    /// Open a file-backed engine in the configured directory.
    pub fn open(config: &SpongeConfig) -> Result<Self> {
        config.validate()?;
        let dir = config
            .dir
            .as_ref()
            .ok_or_else(|| Error::Config("storage directory is required".to_string()))?;

        let log = FileLog::open(dir, config.sync_mode)?;
        Self::with_log(log, config)
    }
}

impl<L: LogBackend + 'static> SpongeEngine<L> {
    /// Start an engine over an already opened backend.
    ///
    /// Only the engine limits of `config` are used; `dir` is ignored.
    pub fn with_log(log: L, config: &SpongeConfig) -> Result<Self> {
        config.validate_engine()?;

        let had_unread_at_open = log.had_unread_at_open();
        let shared = Arc::new(Shared::new(log, config));

        let worker = Arc::clone(&shared);
        let flusher = thread::Builder::new()
            .name(FLUSH_THREAD_NAME.to_string())
            .spawn(move || worker.run_flusher())
            .map_err(|e| Error::Storage(format!("Failed to spawn flush thread: {}", e)))?;

        info!(
            max_memory_bytes = config.max_memory_bytes,
            batch_write_count = config.batch_write_count,
            idle_release_ms = config.idle_release_timeout_ms,
            backlog = had_unread_at_open,
            "Started overflow buffer"
        );

        Ok(Self {
            shared,
            flusher: Some(flusher),
            had_unread_at_open,
        })
    }

    /// Current health of the flush pipeline
    pub fn health(&self) -> EngineHealth {
        match self.shared.health.lock() {
            Ok(health) => health.clone(),
            Err(_) => EngineHealth::Failed {
                reason: Error::LockPoisoned.to_string(),
            },
        }
    }

    /// Snapshot of the engine counters and log positions
    pub fn stats(&self) -> Result<EngineStats> {
        let (log_read_position, log_write_position) = {
            let io = self.shared.io.lock()?;
            (io.log.read_position(), io.log.write_position())
        };
        let (staged_records, staged_bytes) = {
            let staging = self.shared.staging.lock()?;
            (staging.records.len(), staging.bytes)
        };

        let c = &self.shared.counters;
        Ok(EngineStats {
            staged_records,
            staged_bytes,
            accepted: c.accepted.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            flushed_batches: c.flushed_batches.load(Ordering::Relaxed),
            flushed_bytes: c.flushed_bytes.load(Ordering::Relaxed),
            fetched_from_log: c.fetched_from_log.load(Ordering::Relaxed),
            fetched_from_batch: c.fetched_from_batch.load(Ordering::Relaxed),
            fetched_from_staging: c.fetched_from_staging.load(Ordering::Relaxed),
            reclamations: c.reclamations.load(Ordering::Relaxed),
            log_read_position,
            log_write_position,
        })
    }

    #[cfg(test)]
    fn without_flusher(log: L, config: &SpongeConfig) -> Self {
        Self {
            had_unread_at_open: log.had_unread_at_open(),
            shared: Arc::new(Shared::new(log, config)),
            flusher: None,
        }
    }
}

impl<L: LogBackend + 'static> Persistence for SpongeEngine<L> {
    fn persist_data(&self, record: Vec<u8>) -> bool {
        let shared = &self.shared;
        shared.maybe_reclaim();

        if let Err(e) = frame::validate(&record) {
            Counters::bump(&shared.counters.rejected, 1);
            warn!(error = %e, "Rejected malformed record");
            return false;
        }

        let len = record.len() as u64;
        let mut staging = match shared.staging.lock() {
            Ok(staging) => staging,
            Err(_) => {
                error!("Staging lock poisoned, dropping record");
                return false;
            }
        };

        if staging.bytes + len > shared.max_memory_bytes {
            let staged_bytes = staging.bytes;
            drop(staging);
            Counters::bump(&shared.counters.dropped, 1);
            warn!(
                record_len = len,
                staged_bytes,
                budget = shared.max_memory_bytes,
                "Overflow buffer full, dropping record; disk writes are not keeping up"
            );
            return false;
        }

        staging.records.push_back(record);
        staging.bytes += len;
        drop(staging);
        shared.staged.notify_one();

        Counters::bump(&shared.counters.accepted, 1);
        true
    }

    fn fetch_data_from_persistence(&self) -> Result<Option<Vec<u8>>> {
        let shared = &self.shared;
        let mut io = shared.io.lock()?;
        let IoState { batch, log } = &mut *io;

        // A torn-down log still reports unread records instead of letting
        // newer in-memory records overtake them
        if !log.is_closed() || log.has_unread() {
            if let Some(record) = log.read_next()? {
                shared.mark_busy();
                Counters::bump(&shared.counters.fetched_from_log, 1);
                return Ok(Some(record));
            }
        }

        if let Some(record) = batch.take_front()? {
            Counters::bump(&shared.counters.fetched_from_batch, 1);
            return Ok(Some(record));
        }

        if let Some(record) = shared.staging.lock()?.pop_front() {
            Counters::bump(&shared.counters.fetched_from_staging, 1);
            return Ok(Some(record));
        }

        shared.mark_idle();
        Ok(None)
    }

    fn have_data_in_persistence(&self) -> bool {
        self.had_unread_at_open
    }

    fn is_healthy(&self) -> bool {
        self.health() == EngineHealth::Running
    }
}

impl<L: LogBackend + 'static> Drop for SpongeEngine<L> {
    fn drop(&mut self) {
        if let Ok(mut staging) = self.shared.staging.lock() {
            staging.shutdown = true;
        }
        self.shared.staged.notify_all();

        if let Some(handle) = self.flusher.take() {
            if handle.join().is_err() {
                error!("Flush thread panicked");
            }
        }

        if let Ok(staging) = self.shared.staging.lock() {
            if !staging.records.is_empty() {
                warn!(
                    records = staging.records.len(),
                    bytes = staging.bytes,
                    "Discarding staged records that could not be flushed"
                );
            }
        }

        self.shared.teardown();
    }
}
