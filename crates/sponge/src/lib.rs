//! # Sponge
//!
//! A bounded, disk-backed overflow buffer for worker-pool task queues.
//!
//! When a pool's in-memory queue is full, the records that do not fit are
//! handed to a [`Persistence`] backend instead of being rejected outright.
//! The default backend, [`SpongeEngine`], stages them in memory under a byte
//! budget and lets a background thread append them to a log file in
//! batches. When the queue has room again the records come back in the
//! order they were submitted, whether they reached the disk or not.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sponge::{frame, SpongeConfig, SpongeService};
//! use std::collections::VecDeque;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SpongeService::builder()
//!         .config(SpongeConfig::new("./spool").with_queue(500, 100))
//!         .build()?;
//!
//!     // Records the queue had no room for
//!     let mut pending: VecDeque<Vec<u8>> = (0..10)
//!         .map(|i| frame::encode([0, 1], format!("task-{}", i).as_bytes()))
//!         .collect::<Result<_, _>>()?;
//!
//!     let report = service.spill(&mut pending);
//!     println!("spilled {} dropped {}", report.accepted, report.dropped);
//!
//!     // Later, when workers have freed slots
//!     for record in service.refill(10)? {
//!         println!("{:?}", frame::payload(&record));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Records
//!
//! Every record is a frame with a 6-byte header whose bytes 2..6 carry the
//! big-endian total length, header included. See [`frame`].
//!
//! ## Crates
//!
//! - `sponge-core`: error type, frame format, the [`Persistence`] trait
//! - `sponge-log`: file and in-memory log backends
//! - `sponge`: staging engine, configuration, queue integration, logging

pub mod config;
pub mod engine;
pub mod logging;
pub mod service;

pub use sponge_core::{frame, Error, Persistence, Result};
pub use sponge_log::{FileLog, LogBackend, MemoryLog, SyncMode, CURSOR_FILE_NAME, DATA_FILE_NAME};

pub use config::SpongeConfig;
pub use engine::{EngineHealth, EngineStats, SpongeEngine, FLUSH_THREAD_NAME};
pub use logging::{LogConfig, LogFormat, LogOutput};
pub use service::{SpillReport, SpongeService, SpongeServiceBuilder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
