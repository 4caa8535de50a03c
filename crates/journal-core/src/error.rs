//! The journal's error taxonomy.
//!
//! Domain errors are `thiserror`-derived so they carry structured variants
//! all the way to the caller; `anyhow` is reserved for the outermost edges
//! (example binaries, test harnesses).

use crate::model::{PersistenceId, SequenceNr};

/// Errors surfaced synchronously or via a future by the journal's public
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// An atomic write would span more than two adjacent partitions.
    /// Non-retriable; the caller must not resubmit unchanged.
    #[error(
        "atomic write for persistence id {pid} spans more than two partitions \
         (first partition {first_partition}, last partition {last_partition})"
    )]
    PartitionSpanViolation {
        /// Persistence id of the rejected write.
        pid: PersistenceId,
        /// Partition of the first row.
        first_partition: i64,
        /// Partition of the last row.
        last_partition: i64,
    },

    /// `delete_to` was called while `support_deletes` is configured off
    ///.
    #[error("deletes are not supported by this journal configuration")]
    DeletesUnsupported,

    /// The per-PID delete queue is at `max_concurrent_deletes` capacity
    ///.
    #[error("delete queue for persistence id {pid} is at capacity ({max_concurrent_deletes})")]
    DeleteBackpressure {
        /// Persistence id whose queue is full.
        pid: PersistenceId,
        /// The configured limit that was hit.
        max_concurrent_deletes: usize,
    },

    /// The backing store rejected a write execution. The per-PID
    /// `write_in_progress` future is still resolved; this only fails the
    /// one batch.
    #[error("write batch for persistence id {pid} failed: {source}")]
    WriteFailed {
        /// Persistence id of the failed batch.
        pid: PersistenceId,
        /// Underlying backend error.
        #[source]
        source: anyhow::Error,
    },

    /// Event payload (de)serialization failed. Propagated unchanged,
    /// never downgraded to a per-batch failure.
    #[error("event serialization failed: {0}")]
    Serialization(#[from] crate::serialize::CodecError),

    /// Constructing an [`crate::model::AtomicWrite`] failed validation
    /// before it ever reached the backing store.
    #[error(transparent)]
    InvalidAtomicWrite(#[from] crate::model::AtomicWriteError),

    /// The backing store itself failed in a way not covered above
    ///.
    #[error("backing store error: {0}")]
    Store(#[source] anyhow::Error),

    /// `highest_sequence_nr` was asked to probe a PID whose coordination
    /// state could not be reached (should not occur in normal operation;
    /// kept distinct from `Store` so callers can tell coordination bugs
    /// apart from backend outages).
    #[error("sequence-number probe for persistence id {0} failed: {1}")]
    ProbeFailed(PersistenceId, #[source] anyhow::Error),

    /// Controller-level fatal error; triggers coordinated shutdown if
    /// configured. The journal is not resumable within the
    /// current process instance after this.
    #[error("fatal journal controller error: {0}")]
    Fatal(#[source] anyhow::Error),
}

/// Per-batch outcome of [`crate::model::AtomicWrite`] execution inside
/// `write_atomic_batches`. Unlike [`JournalError`], this is not
/// used for precondition or serialization failures — those fail the whole
/// call rather than being downgraded to a per-batch failure.
pub type WriteOutcome = Result<(), JournalError>;

/// Convenience alias used throughout the journal crates.
pub type JournalResult<T> = Result<T, JournalError>;

/// The effective delete bound, distinguishing an
/// explicit sequence number from the "delete everything" magic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    /// Delete up to and including this sequence number.
    UpTo(SequenceNr),
    /// Delete everything currently stored for the PID.
    All,
}
