//! Sequence-number probe: `highest_sequence_nr`/`lowest_sequence_nr`,
//! tolerant of deletion holes and partition-spanning writes.

use std::sync::Arc;

use journal_core::error::{JournalError, JournalResult};
use journal_core::model::SequenceNr;
use journal_core::partition::PartitionMapper;
use journal_core::store::JournalStore;

use crate::coordination::PerPidLocks;

/// Probes the highest and lowest stored sequence numbers for a PID.
pub struct SequenceProbe<S: JournalStore> {
    store: Arc<S>,
    locks: Arc<PerPidLocks>,
    partitions: PartitionMapper,
}

impl<S: JournalStore> SequenceProbe<S> {
    /// Builds a probe over `store`, sharing `locks` with the write
    /// coordinator so it observes read-your-writes for a PID's in-flight write.
    pub fn new(store: Arc<S>, locks: Arc<PerPidLocks>, partitions: PartitionMapper) -> Self {
        Self { store, locks, partitions }
    }

    /// `highest_sequence_nr(pid, from_seq)`.
    ///
    /// Awaits any write in progress for `pid`, then scans partitions
    /// forward from `partition_of(from_seq)`. An empty partition is probed
    /// one further partition ahead before giving up, tolerating both a
    /// fully physically-deleted partition and an atomic write that starts
    /// exactly on a partition boundary and leaves the prior partition
    /// empty.
    pub async fn highest_sequence_nr(&self, pid: &str, from_seq: SequenceNr) -> JournalResult<SequenceNr> {
        self.locks.await_in_progress(pid).await;

        let mut partition = self.partitions.partition_of(from_seq.max(1));
        let mut highest = from_seq;

        loop {
            let found = self.probe_partition(pid, partition).await?;
            match found {
                Some(seq) => {
                    highest = seq;
                    partition += 1;
                }
                None => {
                    let lookahead = partition + 1;
                    match self.probe_partition(pid, lookahead).await? {
                        Some(seq) => {
                            highest = seq;
                            partition = lookahead + 1;
                        }
                        None => return Ok(highest),
                    }
                }
            }
        }
    }

    async fn probe_partition(&self, pid: &str, partition_nr: i64) -> JournalResult<Option<SequenceNr>> {
        self.store
            .highest_sequence_nr_in_partition(pid, partition_nr)
            .await
            .map_err(|e| JournalError::ProbeFailed(pid.to_string(), e))
            .map(|found| found.filter(|&seq| seq > 0))
    }

    /// `lowest_sequence_nr(pid, from_seq, deleted_to)`: the first
    /// stored event's sequence number strictly above `deleted_to`, or
    /// `from_seq` if none exists.
    pub async fn lowest_sequence_nr(
        &self,
        pid: &str,
        from_seq: SequenceNr,
        deleted_to: SequenceNr,
    ) -> JournalResult<SequenceNr> {
        let found = self
            .store
            .lowest_sequence_nr_after(pid, deleted_to)
            .await
            .map_err(|e| JournalError::ProbeFailed(pid.to_string(), e))?;
        Ok(found.unwrap_or(from_seq))
    }
}
