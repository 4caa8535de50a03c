//! Journal controller: owns every coordination component, drives startup
//! prewarming, and is the single entry point the hosting framework calls
//! into.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use journal_core::config::JournalConfig;
use journal_core::error::{DeleteTarget, JournalError, JournalResult, WriteOutcome};
use journal_core::model::{AtomicWrite, PersistenceId, SequenceNr, SerializedEvent};
use journal_core::partition::PartitionMapper;
use journal_core::store::JournalStore;
use journal_core::tagwrite::TagSink;
use journal_core::timeuuid::TimeUuidGen;

use crate::coordination::PerPidLocks;
use crate::delete::DeleteCoordinator;
use crate::replay::ReplayCursor;
use crate::seqnr::SequenceProbe;
use crate::tagwrite::TagWriteDispatcher;
use crate::write::WriteCoordinator;

/// Invoked when the controller hits a [`JournalError::Fatal`] and
/// `coordinated_shutdown_on_error` is set. The journal is not
/// resumable within the current process instance after this fires.
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    /// Runs the hosting framework's coordinated shutdown.
    async fn shutdown(&self);
}

/// The top-level journal. Holds every coordination component and
/// exposes the four public operations the hosting framework calls.
pub struct JournalController<S: JournalStore> {
    config: JournalConfig,
    write: WriteCoordinator<S>,
    delete: DeleteCoordinator<S>,
    probe: Arc<SequenceProbe<S>>,
    replay: ReplayCursor<S>,
    tagwrite: Arc<TagWriteDispatcher<S>>,
    shutdown_hook: Option<Arc<dyn ShutdownHook>>,
}

impl<S: JournalStore> JournalController<S> {
    /// Builds and prewarms a controller. Fails if `config` doesn't validate.
    pub async fn new(
        store: Arc<S>,
        config: JournalConfig,
        time_uuid_gen: Arc<dyn TimeUuidGen>,
        tag_sink: Arc<dyn TagSink>,
        shutdown_hook: Option<Arc<dyn ShutdownHook>>,
    ) -> JournalResult<Self> {
        config
            .validate()
            .map_err(|err| JournalError::Fatal(anyhow::anyhow!(err)))?;

        let report = store
            .prewarm(config.support_deletes, config.cassandra_2x_compat)
            .await
            .map_err(JournalError::Fatal)?;
        info!(prepared = ?report.prepared, "journal: startup prewarm complete");

        let partitions = PartitionMapper::new(config.target_partition_size);
        let locks = Arc::new(PerPidLocks::new());
        let probe = Arc::new(SequenceProbe::new(store.clone(), locks.clone(), partitions));
        let tagwrite = Arc::new(TagWriteDispatcher::new(
            tag_sink,
            store.clone(),
            config.events_by_tag_enabled,
        ));
        let write = WriteCoordinator::new(
            store.clone(),
            locks.clone(),
            partitions,
            config.max_message_batch_size,
            time_uuid_gen,
            tagwrite.clone(),
        );
        let delete = DeleteCoordinator::new(
            store.clone(),
            probe.clone(),
            partitions,
            config.max_message_batch_size,
            config.max_concurrent_deletes,
            config.support_deletes,
            config.cassandra_2x_compat,
        );
        let replay = ReplayCursor::new(store);

        Ok(Self {
            config,
            write,
            delete,
            probe,
            replay,
            tagwrite,
            shutdown_hook,
        })
    }

    /// `write_atomic_batches(batches)`.
    pub async fn write_atomic_batches(&self, batches: Vec<AtomicWrite>) -> JournalResult<Vec<WriteOutcome>> {
        self.guard(self.write.write_atomic_batches(batches)).await
    }

    /// `delete_to(pid, target)`.
    pub async fn delete_to(&self, pid: &str, target: DeleteTarget) -> JournalResult<()> {
        self.guard(self.delete.delete_to(pid, target)).await
    }

    /// `highest_sequence_nr(pid, from_seq)`.
    pub async fn highest_sequence_nr(&self, pid: &str, from_seq: SequenceNr) -> JournalResult<SequenceNr> {
        self.guard(self.probe.highest_sequence_nr(pid, from_seq)).await
    }

    /// `replay_messages(pid, from_seq, to_seq, max, callback)`.
    pub async fn replay_messages<F, Fut>(
        &self,
        pid: &str,
        from_seq: SequenceNr,
        to_seq: SequenceNr,
        max_events: u64,
        callback: F,
    ) -> JournalResult<()>
    where
        F: FnMut(SerializedEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.guard(self.replay.replay_messages(pid, from_seq, to_seq, max_events, callback))
            .await
    }

    /// The pre-snapshot tag-writes hook a reader's recovery path calls when
    /// its own probe found `highest_sequence_nr == from_seq`.
    pub async fn publish_pre_snapshot_progress(
        &self,
        persistence_id: &PersistenceId,
        highest_sequence_nr: SequenceNr,
        from_seq: SequenceNr,
        scan_from_seq: SequenceNr,
    ) -> JournalResult<()> {
        self.guard(self.tagwrite.publish_pre_snapshot_progress(
            persistence_id,
            highest_sequence_nr,
            from_seq,
            scan_from_seq,
        ))
        .await
    }

    /// Runs `op`, escalating a [`JournalError::Fatal`] to coordinated
    /// shutdown if configured.
    async fn guard<T>(&self, op: impl Future<Output = JournalResult<T>>) -> JournalResult<T> {
        let result = op.await;
        if let Err(JournalError::Fatal(err)) = &result {
            error!(error = %err, "journal: fatal controller error");
            if self.config.coordinated_shutdown_on_error {
                if let Some(hook) = &self.shutdown_hook {
                    hook.shutdown().await;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::model::{AtomicWrite, SerializedEvent};
    use journal_core::timeuuid::MonotonicTimeUuidGen;
    use journal_memory::{CollectingTagSink, MemoryStore};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    fn ev(pid: &str, seq: SequenceNr, tags: &[&str]) -> SerializedEvent {
        SerializedEvent {
            persistence_id: pid.to_string(),
            partition_nr: 0,
            sequence_nr: seq,
            time_uuid: Uuid::nil(),
            time_bucket: "2026-07".to_string(),
            writer_uuid: "writer-1".to_string(),
            event_payload: vec![],
            ser_id: 1,
            ser_manifest: "test".to_string(),
            event_adapter_manifest: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            meta: None,
        }
    }

    struct RecordingShutdownHook {
        called: AtomicBool,
    }

    #[async_trait]
    impl ShutdownHook for RecordingShutdownHook {
        async fn shutdown(&self) {
            self.called.store(true, Ordering::SeqCst);
        }
    }

    async fn controller() -> (
        JournalController<MemoryStore>,
        Arc<CollectingTagSink>,
        Arc<MemoryStore>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(CollectingTagSink::new());
        let config = JournalConfig {
            target_partition_size: 5,
            ..JournalConfig::default()
        };
        let controller = JournalController::new(
            store.clone(),
            config,
            Arc::new(MonotonicTimeUuidGen::new()),
            sink.clone(),
            None,
        )
        .await
        .unwrap();
        (controller, sink, store)
    }

    #[tokio::test]
    async fn write_then_probe_highest() {
        let (controller, _sink, _store) = controller().await;
        let write = AtomicWrite::new(vec![ev("A", 1, &[]), ev("A", 2, &[]), ev("A", 3, &[])]).unwrap();

        let outcomes = controller.write_atomic_batches(vec![write]).await.unwrap();
        assert!(outcomes.iter().all(Result::is_ok));
        assert_eq!(controller.highest_sequence_nr("A", 0).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn delete_then_replay_is_empty() {
        let (controller, _sink, _store) = controller().await;
        let write = AtomicWrite::new(vec![ev("A", 1, &[]), ev("A", 2, &[]), ev("A", 3, &[])]).unwrap();
        controller.write_atomic_batches(vec![write]).await.unwrap();

        controller.delete_to("A", DeleteTarget::UpTo(3)).await.unwrap();

        let mut seen = Vec::new();
        controller
            .replay_messages("A", 1, SequenceNr::MAX, 100, |row| {
                seen.push(row.sequence_nr);
                async {}
            })
            .await
            .unwrap();
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn tag_writer_receives_in_order() {
        let (controller, sink, _store) = controller().await;
        let first = AtomicWrite::new(vec![
            ev("A", 1, &["red"]),
            ev("A", 2, &["red"]),
            ev("A", 3, &["red"]),
            ev("A", 4, &["red"]),
            ev("A", 5, &["red"]),
        ])
        .unwrap();
        let second = AtomicWrite::new(vec![ev("A", 6, &["red", "blue"]), ev("A", 7, &["red", "blue"])]).unwrap();

        controller.write_atomic_batches(vec![first]).await.unwrap();
        controller.write_atomic_batches(vec![second]).await.unwrap();

        let received = sink.received().await;
        let red_events: Vec<SequenceNr> = received
            .iter()
            .flat_map(|w| w.per_tag_writes.iter())
            .filter(|w| w.tag == "red")
            .flat_map(|w| w.events.iter().map(|e| e.sequence_nr))
            .collect();
        assert_eq!(red_events, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn deletes_disabled_fails_fast() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(CollectingTagSink::new());
        let config = JournalConfig {
            support_deletes: false,
            ..JournalConfig::default()
        };
        let controller = JournalController::new(
            store,
            config,
            Arc::new(MonotonicTimeUuidGen::new()),
            sink,
            None,
        )
        .await
        .unwrap();

        let err = controller.delete_to("A", DeleteTarget::UpTo(1)).await.unwrap_err();
        assert!(matches!(err, JournalError::DeletesUnsupported));
    }

    #[tokio::test]
    async fn invalid_config_fails_construction() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(CollectingTagSink::new());
        let config = JournalConfig {
            target_partition_size: 0,
            ..JournalConfig::default()
        };
        let err = JournalController::new(store, config, Arc::new(MonotonicTimeUuidGen::new()), sink, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::Fatal(_)));
    }

    #[tokio::test]
    async fn fatal_probe_error_triggers_shutdown_hook() {
        struct FailingStore(MemoryStore);

        #[async_trait]
        impl JournalStore for FailingStore {
            async fn prewarm(
                &self,
                support_deletes: bool,
                cassandra_2x_compat: bool,
            ) -> anyhow::Result<journal_core::store::PrewarmReport> {
                self.0.prewarm(support_deletes, cassandra_2x_compat).await
            }
            async fn write_batch(&self, rows: &[SerializedEvent]) -> anyhow::Result<()> {
                self.0.write_batch(rows).await
            }
            async fn highest_sequence_nr_in_partition(
                &self,
                _pid: &str,
                _partition_nr: i64,
            ) -> anyhow::Result<Option<SequenceNr>> {
                anyhow::bail!("simulated backend outage")
            }
            async fn lowest_sequence_nr_after(
                &self,
                pid: &str,
                after: SequenceNr,
            ) -> anyhow::Result<Option<SequenceNr>> {
                self.0.lowest_sequence_nr_after(pid, after).await
            }
            async fn read_deleted_to(&self, pid: &str) -> anyhow::Result<Option<SequenceNr>> {
                self.0.read_deleted_to(pid).await
            }
            async fn upsert_deleted_to(&self, pid: &str, to_seq: SequenceNr) -> anyhow::Result<()> {
                self.0.upsert_deleted_to(pid, to_seq).await
            }
            async fn delete_partition_range(
                &self,
                pid: &str,
                partition_nr: i64,
                to_seq: SequenceNr,
            ) -> anyhow::Result<()> {
                self.0.delete_partition_range(pid, partition_nr, to_seq).await
            }
            async fn delete_rows(
                &self,
                pid: &str,
                partition_nr: i64,
                seq_numbers: &[SequenceNr],
            ) -> anyhow::Result<()> {
                self.0.delete_rows(pid, partition_nr, seq_numbers).await
            }
            async fn partition_info(
                &self,
                pid: &str,
                partition_nr: i64,
            ) -> anyhow::Result<Option<journal_core::model::PartitionInfo>> {
                self.0.partition_info(pid, partition_nr).await
            }
            async fn read_events(
                &self,
                pid: &PersistenceId,
                from_seq: SequenceNr,
                to_seq: SequenceNr,
                max_events: u64,
            ) -> anyhow::Result<Vec<SerializedEvent>> {
                self.0.read_events(pid, from_seq, to_seq, max_events).await
            }
        }

        let store = Arc::new(FailingStore(MemoryStore::new()));
        let sink = Arc::new(CollectingTagSink::new());
        let hook = Arc::new(RecordingShutdownHook {
            called: AtomicBool::new(false),
        });
        let controller = JournalController::new(
            store,
            JournalConfig::default(),
            Arc::new(MonotonicTimeUuidGen::new()),
            sink,
            Some(hook.clone()),
        )
        .await
        .unwrap();

        // `ProbeFailed` (not `Fatal`) is what a backend outage actually
        // surfaces as; this just confirms the non-fatal path does not
        // trip the shutdown hook.
        let err = controller.highest_sequence_nr("A", 0).await.unwrap_err();
        assert!(matches!(err, JournalError::ProbeFailed(_, _)));
        assert!(!hook.called.load(Ordering::SeqCst));
    }
}
