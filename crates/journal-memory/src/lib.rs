#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **journal-memory** – in-memory [`JournalStore`] and [`TagSink`] for the
//! durable event journal.
//!
//! Fast, non-persistent, and exercises exactly the same trait contracts
//! `journal-scylla` does, so the coordination algorithms in `journal` run
//! unmodified against either. Intended for tests and local development.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use journal_core::model::{PartitionInfo, PartitionNr, PersistenceId, SequenceNr, SerializedEvent};
use journal_core::store::{JournalStore, PrewarmReport};
use journal_core::tagwrite::{BulkTagWrite, TagSink};

/// An in-memory, non-persistent [`JournalStore`].
///
/// Rows are kept in one sorted map per persistence id; partition-scoped
/// queries filter on the row's stored `partition_nr` rather than
/// maintaining a second index, since the expected cardinality (events per
/// PID) is small enough for this to be cheap in practice and it keeps the
/// two maps that matter — "what's the deleted-to marker" and "what rows
/// exist" — trivially consistent with each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: DashMap<PersistenceId, BTreeMap<SequenceNr, SerializedEvent>>,
    deleted_to: DashMap<PersistenceId, SequenceNr>,
}

impl MemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows stored across every persistence id. Useful for
    /// assertions in tests.
    pub fn event_count(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl JournalStore for MemoryStore {
    async fn prewarm(&self, _support_deletes: bool, _cassandra_2x_compat: bool) -> anyhow::Result<PrewarmReport> {
        // No prepared-statement concept for an in-memory map.
        Ok(PrewarmReport::default())
    }

    async fn write_batch(&self, rows: &[SerializedEvent]) -> anyhow::Result<()> {
        for row in rows {
            self.events
                .entry(row.persistence_id.clone())
                .or_default()
                .insert(row.sequence_nr, row.clone());
        }
        Ok(())
    }

    async fn highest_sequence_nr_in_partition(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
    ) -> anyhow::Result<Option<SequenceNr>> {
        let Some(rows) = self.events.get(pid) else {
            return Ok(None);
        };
        Ok(rows
            .values()
            .filter(|row| row.partition_nr == partition_nr)
            .map(|row| row.sequence_nr)
            .max())
    }

    async fn lowest_sequence_nr_after(
        &self,
        pid: &str,
        after: SequenceNr,
    ) -> anyhow::Result<Option<SequenceNr>> {
        let Some(rows) = self.events.get(pid) else {
            return Ok(None);
        };
        Ok(rows.range((after + 1)..).next().map(|(seq, _)| *seq))
    }

    async fn read_deleted_to(&self, pid: &str) -> anyhow::Result<Option<SequenceNr>> {
        Ok(self.deleted_to.get(pid).map(|v| *v))
    }

    async fn upsert_deleted_to(&self, pid: &str, to_seq: SequenceNr) -> anyhow::Result<()> {
        self.deleted_to.insert(pid.to_string(), to_seq);
        Ok(())
    }

    async fn delete_partition_range(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
        to_seq: SequenceNr,
    ) -> anyhow::Result<()> {
        if let Some(mut rows) = self.events.get_mut(pid) {
            rows.retain(|seq, row| !(row.partition_nr == partition_nr && *seq <= to_seq));
        }
        Ok(())
    }

    async fn delete_rows(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
        seq_numbers: &[SequenceNr],
    ) -> anyhow::Result<()> {
        if let Some(mut rows) = self.events.get_mut(pid) {
            for seq in seq_numbers {
                if let Some(row) = rows.get(seq) {
                    if row.partition_nr == partition_nr {
                        rows.remove(seq);
                    }
                }
            }
        }
        Ok(())
    }

    async fn partition_info(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
    ) -> anyhow::Result<Option<PartitionInfo>> {
        let Some(rows) = self.events.get(pid) else {
            return Ok(None);
        };
        let mut min = None;
        let mut max = None;
        for row in rows.values().filter(|r| r.partition_nr == partition_nr) {
            min = Some(min.map_or(row.sequence_nr, |m: SequenceNr| m.min(row.sequence_nr)));
            max = Some(max.map_or(row.sequence_nr, |m: SequenceNr| m.max(row.sequence_nr)));
        }
        Ok(match (min, max) {
            (Some(min_sequence_nr), Some(max_sequence_nr)) => Some(PartitionInfo {
                partition_nr,
                min_sequence_nr,
                max_sequence_nr,
            }),
            _ => None,
        })
    }

    async fn read_events(
        &self,
        pid: &PersistenceId,
        from_seq: SequenceNr,
        to_seq: SequenceNr,
        max_events: u64,
    ) -> anyhow::Result<Vec<SerializedEvent>> {
        let Some(rows) = self.events.get(pid) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .range(from_seq..=to_seq)
            .take(max_events as usize)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

/// A [`TagSink`] that collects every [`BulkTagWrite`] it receives, in
/// order, for assertions in tests. `journal`'s default production sink is
/// channel-backed (see `journal::tagwrite::ChannelTagSink`); this one
/// trades the channel's async hop for direct, synchronously-inspectable
/// storage.
#[derive(Debug, Default)]
pub struct CollectingTagSink {
    received: Mutex<Vec<BulkTagWrite>>,
}

impl CollectingTagSink {
    /// A fresh, empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every write received so far, in receipt order.
    pub async fn received(&self) -> Vec<BulkTagWrite> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl TagSink for CollectingTagSink {
    async fn send(&self, write: BulkTagWrite) {
        self.received.lock().await.push(write);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn ev(pid: &str, partition_nr: PartitionNr, seq: SequenceNr) -> SerializedEvent {
        SerializedEvent {
            persistence_id: pid.to_string(),
            partition_nr,
            sequence_nr: seq,
            time_uuid: Uuid::new_v4(),
            time_bucket: "2026-07".to_string(),
            writer_uuid: "writer-1".to_string(),
            event_payload: vec![],
            ser_id: 1,
            ser_manifest: "test".to_string(),
            event_adapter_manifest: String::new(),
            tags: BTreeSet::new(),
            meta: None,
        }
    }

    #[tokio::test]
    async fn write_and_probe_highest() {
        let store = MemoryStore::new();
        store
            .write_batch(&[ev("A", 0, 1), ev("A", 0, 2), ev("A", 0, 3)])
            .await
            .unwrap();
        assert_eq!(
            store.highest_sequence_nr_in_partition("A", 0).await.unwrap(),
            Some(3)
        );
        let replay = store
            .read_events(&"A".to_string(), 1, SequenceNr::MAX, 100)
            .await
            .unwrap();
        assert_eq!(
            replay.iter().map(|e| e.sequence_nr).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn highest_seq_tolerates_skipped_partition() {
        // target_partition_size = 5: event 1 lands in partition 0, event
        // P+5 = 10 lands in partition 1 which starts late.
        let store = MemoryStore::new();
        store.write_batch(&[ev("A", 0, 1)]).await.unwrap();
        store.write_batch(&[ev("A", 1, 10)]).await.unwrap();
        assert_eq!(
            store.highest_sequence_nr_in_partition("A", 0).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            store.highest_sequence_nr_in_partition("A", 1).await.unwrap(),
            Some(10)
        );
    }

    #[tokio::test]
    async fn delete_marker_and_physical_delete() {
        let store = MemoryStore::new();
        store
            .write_batch(&[ev("A", 0, 1), ev("A", 0, 2), ev("A", 0, 3)])
            .await
            .unwrap();
        store.upsert_deleted_to("A", 3).await.unwrap();
        assert_eq!(store.read_deleted_to("A").await.unwrap(), Some(3));
        store.delete_partition_range("A", 0, 3).await.unwrap();
        let replay = store
            .read_events(&"A".to_string(), 1, SequenceNr::MAX, 100)
            .await
            .unwrap();
        assert!(replay.is_empty());
    }

    #[tokio::test]
    async fn compat_mode_delete_rows_is_selective() {
        let store = MemoryStore::new();
        store
            .write_batch(&[ev("A", 0, 1), ev("A", 0, 2), ev("A", 0, 3)])
            .await
            .unwrap();
        store.delete_rows("A", 0, &[1, 3]).await.unwrap();
        let replay = store
            .read_events(&"A".to_string(), 1, SequenceNr::MAX, 100)
            .await
            .unwrap();
        assert_eq!(
            replay.iter().map(|e| e.sequence_nr).collect::<Vec<_>>(),
            vec![2]
        );
    }

    #[tokio::test]
    async fn lowest_sequence_nr_after_deleted_to() {
        let store = MemoryStore::new();
        store
            .write_batch(&[ev("A", 0, 1), ev("A", 0, 2), ev("A", 0, 3)])
            .await
            .unwrap();
        assert_eq!(store.lowest_sequence_nr_after("A", 1).await.unwrap(), Some(2));
        assert_eq!(store.lowest_sequence_nr_after("A", 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn collecting_tag_sink_preserves_order() {
        let sink = CollectingTagSink::new();
        for i in 0..3 {
            sink.send(BulkTagWrite {
                persistence_id: "A".to_string(),
                per_tag_writes: vec![],
                untagged_events: vec![ev("A", 0, i)],
            })
            .await;
        }
        let received = sink.received().await;
        assert_eq!(received.len(), 3);
        assert_eq!(received[0].untagged_events[0].sequence_nr, 0);
        assert_eq!(received[2].untagged_events[0].sequence_nr, 2);
    }
}
