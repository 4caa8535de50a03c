//! Per-PID coordination state: a write-in-progress lock map shared by
//! the write coordinator and the sequence-number probe.
//!
//! Write-in-progress state is conceptually `map<PID, future>` — presence
//! indicates an outstanding write, and readers await the future before
//! proceeding rather than locking anything. A `tokio::sync::Mutex` held for
//! the duration of a write is the same guarantee without hand-rolling a
//! future registry: a write holds the lock across its whole body (success
//! or failure), and a reader acquires-then-immediately-releases it to wait
//! for whatever write is currently in flight, exactly mirroring "await the
//! future, don't block subsequent writes."

use std::sync::Arc;

use dashmap::DashMap;
use journal_core::model::PersistenceId;
use tokio::sync::Mutex;

/// One lock per PID, created lazily on first use and retained for the life
/// of the controller (per-PID state "exists only while at least one
/// request for that PID is in flight" in spirit, though we do not evict
/// entries — the map stays small relative to the event volume it guards).
#[derive(Debug, Default)]
pub struct PerPidLocks {
    locks: DashMap<PersistenceId, Arc<Mutex<()>>>,
}

impl PerPidLocks {
    /// A fresh, empty lock map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `pid`, creating it if this is the first time `pid`
    /// has been seen.
    pub fn lock_for(&self, pid: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(pid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Waits for any write currently in progress for `pid` to complete,
    /// without blocking future writes.
    pub async fn await_in_progress(&self, pid: &str) {
        let lock = self.lock_for(pid);
        drop(lock.lock().await);
    }
}
