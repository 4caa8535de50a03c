//! Tag-write dispatch: the default channel-backed [`TagSink`] and the
//! pre-snapshot tag-writes path.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use journal_core::error::{JournalError, JournalResult};
use journal_core::model::{PersistenceId, SequenceNr, SerializedEvent};
use journal_core::store::JournalStore;
use journal_core::tagwrite::{BulkTagWrite, TagSink};

/// The production [`TagSink`]: an `mpsc` channel to the external tag-view
/// writer. A single channel preserves the order writes are handed to it in;
/// delivery is fire-and-forget, the journal never blocks a caller on
/// tag-view durability.
pub struct ChannelTagSink {
    tx: mpsc::Sender<BulkTagWrite>,
}

impl ChannelTagSink {
    /// Builds a sink and its paired receiver. `capacity` bounds how far the
    /// tag writer may lag behind the journal before `send` starts
    /// backpressuring the write path (the journal does not fail a write on
    /// a full channel; see [`TagSink::send`]'s contract).
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BulkTagWrite>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TagSink for ChannelTagSink {
    async fn send(&self, write: BulkTagWrite) {
        if let Err(err) = self.tx.send(write).await {
            warn!(
                pid = %err.0.persistence_id,
                "tag-write channel has no receiver, dropping write"
            );
        }
    }
}

/// Wraps a [`TagSink`] with the parts of tag dispatch that need storage
/// access: the pre-snapshot tag-writes path run at reader recovery.
pub struct TagWriteDispatcher<S: JournalStore> {
    sink: Arc<dyn TagSink>,
    store: Arc<S>,
    events_by_tag_enabled: bool,
}

impl<S: JournalStore> TagWriteDispatcher<S> {
    /// Builds a dispatcher. `events_by_tag_enabled` gates both the normal
    /// and pre-snapshot paths.
    pub fn new(sink: Arc<dyn TagSink>, store: Arc<S>, events_by_tag_enabled: bool) -> Self {
        Self {
            sink,
            store,
            events_by_tag_enabled,
        }
    }

    /// Dispatches the `BulkTagWrite` for one just-committed batch. A no-op when the tag view is disabled.
    pub async fn dispatch(&self, persistence_id: &PersistenceId, events: &[SerializedEvent]) {
        if !self.events_by_tag_enabled {
            return;
        }
        let write = BulkTagWrite::extract(persistence_id.clone(), events);
        self.sink.send(write).await;
    }

    /// Pre-snapshot tag-writes path: called when a reader's recovery
    /// probe finds `highest_sequence_nr == from_seq`, meaning recovery will
    /// replay zero events and the usual "replay drives tag progress" path
    /// will never fire. Synthesizes tag progress from whatever rows already
    /// exist in storage from `scan_from_seq` onward. A no-op outside that
    /// zero-replay case, or when the tag view is disabled.
    pub async fn publish_pre_snapshot_progress(
        &self,
        persistence_id: &PersistenceId,
        highest_sequence_nr: SequenceNr,
        from_seq: SequenceNr,
        scan_from_seq: SequenceNr,
    ) -> JournalResult<()> {
        if !self.events_by_tag_enabled || highest_sequence_nr != from_seq {
            return Ok(());
        }
        let rows = self
            .store
            .read_events(persistence_id, scan_from_seq, highest_sequence_nr, u64::MAX)
            .await
            .map_err(JournalError::Store)?;
        if rows.is_empty() {
            return Ok(());
        }
        let write = BulkTagWrite::extract(persistence_id.clone(), &rows);
        self.sink.send(write).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_memory::MemoryStore;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn ev(pid: &str, seq: SequenceNr, tags: &[&str]) -> SerializedEvent {
        SerializedEvent {
            persistence_id: pid.to_string(),
            partition_nr: 0,
            sequence_nr: seq,
            time_uuid: Uuid::new_v4(),
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

    #[tokio::test]
    async fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelTagSink::new(8);
        sink.send(BulkTagWrite {
            persistence_id: "A".to_string(),
            per_tag_writes: vec![],
            untagged_events: vec![ev("A", 1, &[])],
        })
        .await;
        sink.send(BulkTagWrite {
            persistence_id: "A".to_string(),
            per_tag_writes: vec![],
            untagged_events: vec![ev("A", 2, &[])],
        })
        .await;
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.untagged_events[0].sequence_nr, 1);
        assert_eq!(second.untagged_events[0].sequence_nr, 2);
    }

    #[tokio::test]
    async fn pre_snapshot_path_noop_unless_zero_replay() {
        let store = Arc::new(MemoryStore::new());
        store.write_batch(&[ev("A", 1, &["red"])]).await.unwrap();
        let (sink, mut rx) = ChannelTagSink::new(8);
        let dispatcher = TagWriteDispatcher::new(Arc::new(sink), store, true);

        // highest (5) != from_seq (0): the normal replay path will fire, so
        // this must do nothing.
        dispatcher
            .publish_pre_snapshot_progress(&"A".to_string(), 5, 0, 1)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pre_snapshot_path_publishes_on_zero_replay() {
        let store = Arc::new(MemoryStore::new());
        store.write_batch(&[ev("A", 1, &["red"]), ev("A", 2, &["red"])]).await.unwrap();
        let (sink, mut rx) = ChannelTagSink::new(8);
        let dispatcher = TagWriteDispatcher::new(Arc::new(sink), store, true);

        // highest (2) == from_seq (2): recovery replays zero events.
        dispatcher
            .publish_pre_snapshot_progress(&"A".to_string(), 2, 2, 1)
            .await
            .unwrap();
        let write = rx.recv().await.unwrap();
        let red = write.per_tag_writes.iter().find(|w| w.tag == "red").unwrap();
        assert_eq!(red.events.len(), 2);
    }
}
