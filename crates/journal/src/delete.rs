//! Delete coordinator: `delete_to`, with per-PID serialization
//! and `max_concurrent_deletes` backpressure.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use tracing::{info, warn};

use journal_core::error::{DeleteTarget, JournalError, JournalResult};
use journal_core::model::{DeletedToMarker, PersistenceId, SequenceNr};
use journal_core::partition::PartitionMapper;
use journal_core::store::JournalStore;
use tokio::sync::oneshot;

use crate::seqnr::SequenceProbe;

/// Per-PID queue bookkeeping. A
/// running delete holds no entry of its own; `pending` holds exactly the
/// requests still waiting for their turn, in arrival order.
struct DeleteQueueState {
    running: bool,
    pending: VecDeque<oneshot::Sender<()>>,
}

/// Serializes concurrent `delete_to` calls per PID and runs the
/// logical/physical delete pipeline.
pub struct DeleteCoordinator<S: JournalStore> {
    store: Arc<S>,
    probe: Arc<SequenceProbe<S>>,
    partitions: PartitionMapper,
    max_message_batch_size: usize,
    max_concurrent_deletes: usize,
    support_deletes: bool,
    cassandra_2x_compat: bool,
    queues: DashMap<PersistenceId, Arc<StdMutex<DeleteQueueState>>>,
}

impl<S: JournalStore> DeleteCoordinator<S> {
    /// Builds a delete coordinator. `probe` resolves the "delete everything"
    /// magic value to a concrete sequence number.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        probe: Arc<SequenceProbe<S>>,
        partitions: PartitionMapper,
        max_message_batch_size: usize,
        max_concurrent_deletes: usize,
        support_deletes: bool,
        cassandra_2x_compat: bool,
    ) -> Self {
        Self {
            store,
            probe,
            partitions,
            max_message_batch_size,
            max_concurrent_deletes,
            support_deletes,
            cassandra_2x_compat,
            queues: DashMap::new(),
        }
    }

    /// `delete_to(pid, target)`.
    pub async fn delete_to(&self, pid: &str, target: DeleteTarget) -> JournalResult<()> {
        if !self.support_deletes {
            return Err(JournalError::DeletesUnsupported);
        }

        let slot = self
            .queues
            .entry(pid.to_string())
            .or_insert_with(|| {
                Arc::new(StdMutex::new(DeleteQueueState {
                    running: false,
                    pending: VecDeque::new(),
                }))
            })
            .clone();

        let wait_rx = {
            let mut state = slot.lock().expect("delete queue mutex poisoned");
            if !state.running {
                state.running = true;
                None
            } else if state.running && state.pending.len() + 1 >= self.max_concurrent_deletes {
                return Err(JournalError::DeleteBackpressure {
                    pid: pid.to_string(),
                    max_concurrent_deletes: self.max_concurrent_deletes,
                });
            } else {
                let (tx, rx) = oneshot::channel();
                state.pending.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = wait_rx {
            let _ = rx.await;
        }

        let result = self.run_pipeline(pid, target).await;

        {
            let mut state = slot.lock().expect("delete queue mutex poisoned");
            match state.pending.pop_front() {
                Some(next) => {
                    let _ = next.send(());
                }
                None => state.running = false,
            }
        }

        result
    }

    /// The logical/physical delete pipeline, run once per accepted request.
    async fn run_pipeline(&self, pid: &str, target: DeleteTarget) -> JournalResult<()> {
        let current_deleted_to = self
            .store
            .read_deleted_to(pid)
            .await
            .map_err(JournalError::Store)?
            .unwrap_or(DeletedToMarker::ABSENT.deleted_to);

        let to_seq = match target {
            DeleteTarget::UpTo(seq) => seq,
            DeleteTarget::All => self.probe.highest_sequence_nr(pid, current_deleted_to).await?,
        };

        if to_seq > current_deleted_to {
            self.store
                .upsert_deleted_to(pid, to_seq)
                .await
                .map_err(JournalError::Store)?;
            info!(pid, to_seq, "journal: logical delete recorded");
        }

        self.physical_delete(pid, current_deleted_to, to_seq).await;
        Ok(())
    }

    /// Physical delete over partitions `[partition_of(deleted_to+1),
    /// partition_of(to_seq)+1]`. Failures here are logged and
    /// swallowed: the logical delete recorded above remains authoritative
    ///.
    async fn physical_delete(&self, pid: &str, previous_deleted_to: SequenceNr, to_seq: SequenceNr) {
        if to_seq <= previous_deleted_to {
            return;
        }
        let first_partition = self.partitions.partition_of(previous_deleted_to + 1);
        let last_partition = self.partitions.partition_of(to_seq) + 1;

        for partition_nr in first_partition..=last_partition {
            if self.cassandra_2x_compat {
                self.physical_delete_compat(pid, partition_nr, to_seq).await;
            } else if let Err(err) = self.store.delete_partition_range(pid, partition_nr, to_seq).await {
                warn!(
                    pid, partition_nr, to_seq, error = %err,
                    "journal: range-mode physical delete failed, manual cleanup may be required"
                );
            }
        }
    }

    async fn physical_delete_compat(&self, pid: &str, partition_nr: i64, to_seq: SequenceNr) {
        let info = match self.store.partition_info(pid, partition_nr).await {
            Ok(Some(info)) => info,
            Ok(None) => return,
            Err(err) => {
                warn!(pid, partition_nr, error = %err, "journal: compat-mode partition probe failed");
                return;
            }
        };

        let seq_numbers: Vec<SequenceNr> = (info.min_sequence_nr..=info.max_sequence_nr)
            .filter(|seq| *seq <= to_seq)
            .collect();
        if seq_numbers.is_empty() {
            return;
        }

        let chunk_size = self.max_message_batch_size.max(1);
        for chunk in seq_numbers.chunks(chunk_size) {
            if let Err(err) = self.store.delete_rows(pid, partition_nr, chunk).await {
                warn!(
                    pid, partition_nr, chunk_len = chunk.len(), error = %err,
                    "journal: compat-mode physical delete chunk failed, manual cleanup may be required"
                );
            }
        }
    }
}
