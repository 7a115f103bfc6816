//! The capability surface a bounded queue uses to spill and recover records.

use crate::Result;

/// Backing store for records that did not fit in a queue's memory.
///
/// Records are opaque, self-delimiting frames (see [`crate::frame`]). An
/// implementation returns them from [`fetch_data_from_persistence`] in the
/// order they were accepted by [`persist_data`], header included.
///
/// [`persist_data`]: Persistence::persist_data
/// [`fetch_data_from_persistence`]: Persistence::fetch_data_from_persistence
pub trait Persistence: Send + Sync {
    /// Admit one record.
    ///
    /// Returns `false` when the record was dropped, for example because the
    /// memory budget is exhausted. A dropped record is not retried or queued.
    /// Never blocks waiting for space.
    fn persist_data(&self, record: Vec<u8>) -> bool;

    /// Take the next unread record, or `Ok(None)` when nothing is buffered.
    ///
    /// Never blocks waiting for data; polling is up to the caller.
    fn fetch_data_from_persistence(&self) -> Result<Option<Vec<u8>>>;

    /// Whether unread records survived from a previous run at startup.
    fn have_data_in_persistence(&self) -> bool;

    /// Whether accepted records are still being made durable.
    ///
    /// Backends with a background write path report `false` once it has
    /// stopped for good.
    fn is_healthy(&self) -> bool {
        true
    }
}
