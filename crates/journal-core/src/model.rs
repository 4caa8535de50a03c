//! Data model shared by every component of the journal.
//!
//! These types describe the atomic unit of storage (a [`SerializedEvent`]
//! row) and the request shape the write path accepts (an [`AtomicWrite`]).
//! Nothing in this module talks to a backing store; it is pure data plus a
//! handful of invariant checks that are cheap to state close to the types
//! they constrain.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier naming one event stream. Events for a PID have
/// strictly monotonic sequence numbers starting at 1.
pub type PersistenceId = String;

/// A tag attached to an event, making it visible in a by-tag query.
pub type Tag = String;

/// Coarse time window identifier used by the tag view for pagination.
pub type TimeBucket = String;

/// Derived row-group index within the messages table.
pub type PartitionNr = i64;

/// Strictly monotonic per-PID sequence number, starting at 1.
pub type SequenceNr = i64;

/// The opaque, serializer-produced form of an event's metadata, or the
/// sentinel substituted when metadata deserialization fails.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetaPayload {
    /// Serializer-produced bytes, or the sentinel payload.
    pub bytes: Vec<u8>,
    /// Serializer id used to produce `bytes`.
    pub ser_id: i32,
    /// Serializer manifest, or [`UNKNOWN_META_MANIFEST`] for the sentinel.
    pub ser_manifest: String,
}

/// Manifest value substituted for metadata that failed to deserialize.
/// Forward-compatibility is valued over strict recovery of unknown
/// metadata types.
pub const UNKNOWN_META_MANIFEST: &str = "unknown-meta-v1";

impl MetaPayload {
    /// Builds the sentinel "unknown meta" value used when metadata
    /// deserialization fails. The event itself is not failed.
    pub fn unknown() -> Self {
        Self {
            bytes: Vec::new(),
            ser_id: 0,
            ser_manifest: UNKNOWN_META_MANIFEST.to_string(),
        }
    }

    /// True if this is the sentinel produced by [`MetaPayload::unknown`].
    pub fn is_unknown(&self) -> bool {
        self.ser_manifest == UNKNOWN_META_MANIFEST
    }
}

/// The atomic unit of storage: one serialized event row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SerializedEvent {
    /// Stream this event belongs to.
    pub persistence_id: PersistenceId,
    /// Derived row-group; see [`crate::partition::PartitionMapper`].
    pub partition_nr: PartitionNr,
    /// Strictly monotonic per-PID sequence number.
    pub sequence_nr: SequenceNr,
    /// Monotone-ish time-ordered identifier minted at write time.
    pub time_uuid: Uuid,
    /// Coarse time window used by the tag view for pagination.
    pub time_bucket: TimeBucket,
    /// Identity of the writing actor instance, shared within one
    /// atomic write.
    pub writer_uuid: String,
    /// Opaque, serializer-produced event payload.
    pub event_payload: Vec<u8>,
    /// Serializer id used to produce `event_payload`.
    pub ser_id: i32,
    /// Serializer manifest for `event_payload`.
    pub ser_manifest: String,
    /// Event-adapter manifest, independent of the serializer manifest.
    pub event_adapter_manifest: String,
    /// Tags attached to this event.
    pub tags: BTreeSet<Tag>,
    /// Optional metadata, serialized independently of the event payload.
    pub meta: Option<MetaPayload>,
}

impl SerializedEvent {
    /// True if this row carries metadata, used by the statement builder
    /// to pick the with/without-meta schema variant.
    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }
}

/// An ordered, non-empty sequence of serialized event rows sharing one PID,
/// whose sequence numbers are contiguous.
#[derive(Clone, Debug, PartialEq)]
pub struct AtomicWrite {
    events: Vec<SerializedEvent>,
}

/// An atomic write was constructed from an empty event list, or from
/// events that did not share one PID / were not sequence-contiguous.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AtomicWriteError {
    /// The event list was empty.
    #[error("an atomic write must contain at least one event")]
    Empty,
    /// More than one distinct `persistence_id` was present.
    #[error("atomic write events must share one persistence id, found {0} and {1}")]
    MixedPersistenceId(PersistenceId, PersistenceId),
    /// Sequence numbers were not contiguous.
    #[error("atomic write sequence numbers must be contiguous, found {0} then {1}")]
    NonContiguous(SequenceNr, SequenceNr),
}

impl AtomicWrite {
    /// Validates and wraps `events` as one atomic write.
    pub fn new(events: Vec<SerializedEvent>) -> Result<Self, AtomicWriteError> {
        let first = events.first().ok_or(AtomicWriteError::Empty)?;
        let pid = &first.persistence_id;
        let mut prev = first.sequence_nr;
        for ev in &events[1..] {
            if &ev.persistence_id != pid {
                return Err(AtomicWriteError::MixedPersistenceId(
                    pid.clone(),
                    ev.persistence_id.clone(),
                ));
            }
            if ev.sequence_nr != prev + 1 {
                return Err(AtomicWriteError::NonContiguous(prev, ev.sequence_nr));
            }
            prev = ev.sequence_nr;
        }
        Ok(Self { events })
    }

    /// The persistence id shared by every event in this write.
    pub fn persistence_id(&self) -> &str {
        &self.events[0].persistence_id
    }

    /// Lowest sequence number in this write.
    pub fn lowest_sequence_nr(&self) -> SequenceNr {
        self.events[0].sequence_nr
    }

    /// Highest sequence number in this write.
    pub fn highest_sequence_nr(&self) -> SequenceNr {
        self.events[self.events.len() - 1].sequence_nr
    }

    /// Borrowed view of the underlying rows, in order.
    pub fn events(&self) -> &[SerializedEvent] {
        &self.events
    }

    /// Consumes the write, returning the underlying rows in order.
    pub fn into_events(self) -> Vec<SerializedEvent> {
        self.events
    }

    /// Number of events in this write.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if this write contains exactly one event.
    pub fn is_single_event(&self) -> bool {
        self.events.len() == 1
    }
}

/// A single `(pid, deleted_to)` row in the metadata table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletedToMarker {
    /// Highest logically deleted sequence number for this PID.
    pub deleted_to: SequenceNr,
}

impl DeletedToMarker {
    /// The marker implied by an absent row: monotone non-decreasing,
    /// starting at 0.
    pub const ABSENT: DeletedToMarker = DeletedToMarker { deleted_to: 0 };
}

/// Derived `(partition_nr, min_sequence_nr, max_sequence_nr)` used during
/// the compatibility-mode physical delete scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Partition this info describes.
    pub partition_nr: PartitionNr,
    /// Lowest sequence number observed in this partition.
    pub min_sequence_nr: SequenceNr,
    /// Highest sequence number observed in this partition.
    pub max_sequence_nr: SequenceNr,
}
