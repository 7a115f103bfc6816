//! Queue integration: the calls a bounded worker-pool queue makes into the
//! overflow buffer when it fills up and when it has room again.

use crate::config::SpongeConfig;
use crate::engine::SpongeEngine;
use sponge_core::{Error, Persistence, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one overflow cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpillReport {
    /// Records admitted by the persistence backend
    pub accepted: usize,
    /// Records the backend refused; they are gone
    pub dropped: usize,
}

impl SpillReport {
    /// Records taken from the pending queue in this cycle
    pub fn total(&self) -> usize {
        self.accepted + self.dropped
    }
}

/// Overflow service shared between a bounded queue and its persistence.
#[derive(Clone)]
pub struct SpongeService {
    persistence: Arc<dyn Persistence>,
    capacity: usize,
    persist_limit: usize,
}

impl fmt::Debug for SpongeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpongeService")
            .field("capacity", &self.capacity)
            .field("persist_limit", &self.persist_limit)
            .finish_non_exhaustive()
    }
}

impl SpongeService {
    /// Start building a service
    pub fn builder() -> SpongeServiceBuilder {
        SpongeServiceBuilder::default()
    }

    /// Capacity of the in-memory queue in front of the buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum records spilled per overflow cycle
    pub fn persist_limit(&self) -> usize {
        self.persist_limit
    }

    /// The persistence backend
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    /// Whether records from a previous run are waiting to be drained
    pub fn has_backlog(&self) -> bool {
        self.persistence.have_data_in_persistence()
    }

    /// Whether the backend still makes spilled records durable.
    ///
    /// Turns `false` for good once the engine's flush thread has died;
    /// spilled records are then only kept in memory.
    pub fn is_healthy(&self) -> bool {
        self.persistence.is_healthy()
    }

    /// Overflow trigger.
    ///
    /// Moves at most `persist_limit` records from the front of `pending`
    /// (records that did not fit in the queue) into persistence. Whatever
    /// is left in `pending` waits for the next cycle.
    pub fn spill(&self, pending: &mut VecDeque<Vec<u8>>) -> SpillReport {
        let mut report = SpillReport::default();

        for _ in 0..self.persist_limit {
            let Some(record) = pending.pop_front() else {
                break;
            };
            if self.persistence.persist_data(record) {
                report.accepted += 1;
            } else {
                report.dropped += 1;
            }
        }

        if report.dropped > 0 {
            warn!(
                accepted = report.accepted,
                dropped = report.dropped,
                "Overflow cycle dropped records"
            );
        } else {
            debug!(accepted = report.accepted, remaining = pending.len(), "Overflow cycle");
        }

        report
    }

    /// Drain trigger.
    ///
    /// Fetches up to `free_slots` records (never more than the queue
    /// capacity) in submission order, stopping early when the buffer runs
    /// dry.
    pub fn refill(&self, free_slots: usize) -> Result<Vec<Vec<u8>>> {
        let want = free_slots.min(self.capacity);
        let mut records = Vec::with_capacity(want);

        while records.len() < want {
            match self.persistence.fetch_data_from_persistence()? {
                Some(record) => records.push(record),
                None => break,
            }
        }

        Ok(records)
    }
}

/// Builder for [`SpongeService`]
#[derive(Default)]
pub struct SpongeServiceBuilder {
    config: Option<SpongeConfig>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl SpongeServiceBuilder {
    /// Queue settings, and the storage directory when no custom backend is set
    pub fn config(mut self, config: SpongeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom persistence backend instead of opening a file-backed engine
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Validate the settings and assemble the service.
    ///
    /// Fails without starting anything when neither a storage directory
    /// nor a persistence backend was given.
    pub fn build(self) -> Result<SpongeService> {
        let (persistence, config) = match (self.persistence, self.config) {
            (Some(persistence), config) => {
                let config = config.unwrap_or_default();
                config.validate_queue()?;
                (persistence, config)
            }
            (None, Some(config)) => {
                config.validate()?;
                let engine: Arc<dyn Persistence> = Arc::new(SpongeEngine::open(&config)?);
                (engine, config)
            }
            (None, None) => {
                return Err(Error::Config(
                    "a storage directory or a persistence backend is required".to_string(),
                ))
            }
        };

        Ok(SpongeService {
            persistence,
            capacity: config.queue_capacity,
            persist_limit: config.persist_limit,
        })
    }
}
