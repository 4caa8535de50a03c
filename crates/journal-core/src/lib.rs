#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **journal-core** – data model, partition math, and backend trait
//! contracts for a durable, tag-indexed event journal backed by a
//! wide-column store.
//!
//! This crate has no concrete backing-store dependency: it defines the
//! shape of a serialized event row, the pure partition-number arithmetic,
//! the serializer gateway contract, the [`store::JournalStore`]
//! abstraction over the backing session, and the tag-write dispatch
//! message. Concrete stores live in `journal-memory` and `journal-scylla`;
//! the coordination algorithms that drive all of this live in `journal`.

/// Journal configuration.
pub mod config;
/// The error taxonomy.
pub mod error;
/// Data model: serialized event rows, atomic writes, markers.
pub mod model;
/// Partition mapper.
pub mod partition;
/// Serializer gateway contract.
pub mod serialize;
/// Backing-store trait abstraction.
pub mod store;
/// Tag-write dispatch message shapes.
pub mod tagwrite;
/// Monotone time-ordered identifier generation.
pub mod timeuuid;

/// Convenient prelude for importing the most common types.
pub mod prelude {
    pub use crate::config::{ConfigError, JournalConfig};
    pub use crate::error::{DeleteTarget, JournalError, JournalResult, WriteOutcome};
    pub use crate::model::{
        AtomicWrite, AtomicWriteError, DeletedToMarker, MetaPayload, PartitionInfo, PartitionNr,
        PersistenceId, SequenceNr, SerializedEvent, Tag, TimeBucket, UNKNOWN_META_MANIFEST,
    };
    pub use crate::partition::PartitionMapper;
    pub use crate::serialize::{
        deserialize_meta, serialize_meta, BoxFuture, CodecError, ColumnPresenceCache,
        DecodeOutcome, EncodeOutcome, EncodedPayload, EventCodec, EventPayload,
    };
    pub use crate::store::{JournalStore, PrewarmReport};
    pub use crate::tagwrite::{BulkTagWrite, PerTagWrite, TagSink};
    pub use crate::timeuuid::{MonotonicTimeUuidGen, TimeUuidGen};
}
