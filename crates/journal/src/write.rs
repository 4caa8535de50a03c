//! Write coordinator: `write_atomic_batches`.

use std::sync::Arc;

use indexmap::IndexMap;
use journal_core::error::{JournalError, JournalResult, WriteOutcome};
use journal_core::model::{AtomicWrite, PersistenceId, SerializedEvent};
use journal_core::partition::PartitionMapper;
use journal_core::store::JournalStore;
use journal_core::timeuuid::TimeUuidGen;
use tracing::{info, warn};

use crate::coordination::PerPidLocks;
use crate::tagwrite::TagWriteDispatcher;

/// Groups, mints UUIDs for, batches, and executes atomic writes, fanning
/// out to the tag-write dispatcher on success.
pub struct WriteCoordinator<S: JournalStore> {
    store: Arc<S>,
    locks: Arc<PerPidLocks>,
    partitions: PartitionMapper,
    max_message_batch_size: usize,
    time_uuid_gen: Arc<dyn TimeUuidGen>,
    tagwrite: Arc<TagWriteDispatcher<S>>,
}

impl<S: JournalStore> WriteCoordinator<S> {
    /// Builds a write coordinator sharing `locks` with the sequence-number
    /// probe so a concurrent `highest_sequence_nr` call observes
    /// read-your-writes.
    pub fn new(
        store: Arc<S>,
        locks: Arc<PerPidLocks>,
        partitions: PartitionMapper,
        max_message_batch_size: usize,
        time_uuid_gen: Arc<dyn TimeUuidGen>,
        tagwrite: Arc<TagWriteDispatcher<S>>,
    ) -> Self {
        Self {
            store,
            locks,
            partitions,
            max_message_batch_size,
            time_uuid_gen,
            tagwrite,
        }
    }

    /// `write_atomic_batches(batches)`.
    ///
    /// Every write's partition span is validated up front, before any I/O:
    /// a violation fails the whole call synchronously, matching
    /// serialization errors in that it is never downgraded to a per-batch
    /// failure. Once validated, writes are grouped by persistence id and
    /// each group's batching/execution runs independently — concurrently
    /// across groups, sequentially within one.
    pub async fn write_atomic_batches(&self, batches: Vec<AtomicWrite>) -> JournalResult<Vec<WriteOutcome>> {
        for write in &batches {
            let first_partition = self.partitions.partition_of(write.lowest_sequence_nr());
            let last_partition = self.partitions.partition_of(write.highest_sequence_nr());
            if !self
                .partitions
                .spans_at_most_two_partitions(write.lowest_sequence_nr(), write.highest_sequence_nr())
            {
                return Err(JournalError::PartitionSpanViolation {
                    pid: write.persistence_id().to_string(),
                    first_partition,
                    last_partition,
                });
            }
        }

        let mut groups: IndexMap<PersistenceId, Vec<(usize, AtomicWrite)>> = IndexMap::new();
        for (index, write) in batches.into_iter().enumerate() {
            groups
                .entry(write.persistence_id().to_string())
                .or_default()
                .push((index, write));
        }

        let total_batches: usize = groups.values().map(|g| g.len()).sum();
        let mut results: Vec<Option<WriteOutcome>> = (0..total_batches).map(|_| None).collect();

        let outcomes = futures::future::join_all(groups.into_iter().map(|(pid, group)| async move {
            let indices: Vec<usize> = group.iter().map(|(index, _)| *index).collect();
            let writes: Vec<AtomicWrite> = group.into_iter().map(|(_, write)| write).collect();
            let outcome = self.run_group(&pid, writes).await;
            (pid, indices, outcome)
        }))
        .await;

        for (pid, indices, outcome) in outcomes {
            for index in indices {
                let copy: WriteOutcome = match &outcome {
                    Ok(()) => Ok(()),
                    Err(message) => Err(JournalError::WriteFailed {
                        pid: pid.clone(),
                        source: anyhow::anyhow!(message.clone()),
                    }),
                };
                results[index] = Some(copy);
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index assigned above")).collect())
    }

    /// Runs one PID's sequential batching/execution pipeline, returning the
    /// single outcome shared by every atomic write in `group`.
    async fn run_group(&self, pid: &str, group: Vec<AtomicWrite>) -> Result<(), String> {
        let lock = self.locks.lock_for(pid);
        let _guard = lock.lock_owned().await;

        let minted: Vec<Vec<SerializedEvent>> = group
            .into_iter()
            .map(|write| {
                write
                    .into_events()
                    .into_iter()
                    .map(|mut event| {
                        event.time_uuid = self.time_uuid_gen.next();
                        event.partition_nr = self.partitions.partition_of(event.sequence_nr);
                        event
                    })
                    .collect()
            })
            .collect();

        // Regroup whole atomic writes into sequential physical batches
        //: the cut falls between writes, never inside one, so
        // no single `AtomicWrite`'s rows are ever split across two
        // `write_batch` calls. If everything fits in one physical batch it
        // is sent as-is, allowed to reach the configured size exactly;
        // otherwise every regrouped batch must stay strictly below it.
        let chunk_size = self.max_message_batch_size.max(1);
        let total: usize = minted.iter().map(Vec::len).sum();
        let mut batches: Vec<Vec<SerializedEvent>> = Vec::new();
        if total <= chunk_size {
            let mut single = Vec::with_capacity(total);
            for rows in minted {
                single.extend(rows);
            }
            if !single.is_empty() {
                batches.push(single);
            }
        } else {
            for rows in minted {
                match batches.last_mut() {
                    Some(batch) if batch.len() + rows.len() < chunk_size => batch.extend(rows),
                    _ => batches.push(rows),
                }
            }
        }

        let mut committed: Vec<SerializedEvent> = Vec::new();
        let mut outcome = Ok(());
        for batch in &batches {
            if let Err(err) = self.store.write_batch(batch).await {
                outcome = Err(err);
                break;
            }
            committed.extend(batch.iter().cloned());
        }

        match outcome {
            Ok(()) => {
                info!(pid, events = committed.len(), "journal: write batch committed");
                self.tagwrite.dispatch(&pid.to_string(), &committed).await;
                Ok(())
            }
            Err(err) => {
                warn!(pid, error = %err, "journal: write batch failed");
                Err(err.to_string())
            }
        }
    }
}
