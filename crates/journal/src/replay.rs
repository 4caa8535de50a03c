//! Read-journal hookup: the `replay_messages` contract.
//!
//! Deliberately thin: it enforces that nothing at or below `deleted_to`
//! is ever delivered, even if the row still physically exists, and
//! delegates everything else to the store.

use std::future::Future;
use std::sync::Arc;

use journal_core::error::{JournalError, JournalResult};
use journal_core::model::SequenceNr;
use journal_core::store::JournalStore;

/// The replay cursor handed to the read side.
pub struct ReplayCursor<S: JournalStore> {
    store: Arc<S>,
}

impl<S: JournalStore> ReplayCursor<S> {
    /// Wraps `store` for replay reads.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// `replay_messages(pid, from_seq, to_seq, max_events, callback)`
    ///: delivers every committed row with
    /// `sequence_nr ∈ [from_seq, to_seq]` and `sequence_nr > deleted_to(pid)`,
    /// in ascending order, exactly once.
    pub async fn replay_messages<F, Fut>(
        &self,
        pid: &str,
        from_seq: SequenceNr,
        to_seq: SequenceNr,
        max_events: u64,
        mut callback: F,
    ) -> JournalResult<()>
    where
        F: FnMut(journal_core::model::SerializedEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let deleted_to = self
            .store
            .read_deleted_to(pid)
            .await
            .map_err(JournalError::Store)?
            .unwrap_or(0);
        let effective_from = from_seq.max(deleted_to + 1);
        if effective_from > to_seq {
            return Ok(());
        }

        let rows = self
            .store
            .read_events(&pid.to_string(), effective_from, to_seq, max_events)
            .await
            .map_err(JournalError::Store)?;

        for row in rows {
            callback(row).await;
        }
        Ok(())
    }
}
