//! Tag-write dispatch message shapes.
//!
//! `journal-core` only defines the message and the sink contract; the
//! actual tag-view writer is an external actor-like subsystem addressed through a single channel. Its internal batching
//! logic is not specified here, only its input contract.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::model::{PersistenceId, SerializedEvent, Tag};

/// One tag's subsequence of events from a batch, in original order
///.
#[derive(Clone, Debug, PartialEq)]
pub struct PerTagWrite {
    /// The tag these events carry.
    pub tag: Tag,
    /// Events carrying `tag`, in original batch order.
    pub events: Vec<SerializedEvent>,
}

/// A single message fanned out from the write path to the tag-view
/// writer for one write call.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkTagWrite {
    /// Persistence id this write belongs to (all events in one
    /// `AtomicWrite` share a PID).
    pub persistence_id: PersistenceId,
    /// Per-tag event subsequences, one entry per distinct tag present in
    /// the batch.
    pub per_tag_writes: Vec<PerTagWrite>,
    /// Events with an empty tag set.
    pub untagged_events: Vec<SerializedEvent>,
}

impl BulkTagWrite {
    /// Extracts a `BulkTagWrite` from a serialized batch. Tag order in `per_tag_writes` follows first
    /// occurrence in `events` so downstream ordering is deterministic.
    pub fn extract(persistence_id: PersistenceId, events: &[SerializedEvent]) -> Self {
        if events.len() == 1 {
            return Self::extract_single(persistence_id, &events[0]);
        }

        let mut order: Vec<Tag> = Vec::new();
        let mut by_tag: BTreeMap<Tag, Vec<SerializedEvent>> = BTreeMap::new();
        let mut untagged_events = Vec::new();

        for event in events {
            if event.tags.is_empty() {
                untagged_events.push(event.clone());
                continue;
            }
            for tag in &event.tags {
                if !by_tag.contains_key(tag) {
                    order.push(tag.clone());
                }
                by_tag.entry(tag.clone()).or_default().push(event.clone());
            }
        }

        let per_tag_writes = order
            .into_iter()
            .map(|tag| {
                let events = by_tag.remove(&tag).unwrap_or_default();
                PerTagWrite { tag, events }
            })
            .collect();

        Self {
            persistence_id,
            per_tag_writes,
            untagged_events,
        }
    }

    /// Single-event fast path: avoids constructing the
    /// intermediate maps `extract` needs for the common multi-tag case.
    fn extract_single(persistence_id: PersistenceId, event: &SerializedEvent) -> Self {
        if event.tags.is_empty() {
            return Self {
                persistence_id,
                per_tag_writes: Vec::new(),
                untagged_events: vec![event.clone()],
            };
        }
        let per_tag_writes = event
            .tags
            .iter()
            .map(|tag| PerTagWrite {
                tag: tag.clone(),
                events: vec![event.clone()],
            })
            .collect();
        Self {
            persistence_id,
            per_tag_writes,
            untagged_events: Vec::new(),
        }
    }
}

/// The channel the journal hands `BulkTagWrite` messages to. Delivery is
/// fire-and-forget from the journal's perspective; the journal does
/// not block the caller on tag-view durability. Implementations are
/// expected to preserve the order in which batches are handed to them
///.
#[async_trait]
pub trait TagSink: Send + Sync {
    /// Hands one `BulkTagWrite` to the tag-view writer. Errors are the
    /// sink's business to retry or log; the journal does not treat a
    /// failed send as a write failure.
    async fn send(&self, write: BulkTagWrite);
}
