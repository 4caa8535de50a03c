//! `JournalStore`: the abstracted backing-store session.
//!
//! The connection pool and prepared-statement cache behind this trait are
//! out of scope; implementations own that plumbing (`journal-scylla`) or
//! skip it entirely (`journal-memory`). Everything in `journal` is
//! written against this trait so it can run unmodified against either.

use async_trait::async_trait;

use crate::model::{PartitionInfo, PartitionNr, PersistenceId, SequenceNr, SerializedEvent};

/// Statement classes the controller prepares at startup. Reported
/// back so tests and operators can see what a given configuration caused
/// to be prepared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrewarmReport {
    /// Names of the statement classes that were prepared, in preparation
    /// order.
    pub prepared: Vec<&'static str>,
}

/// The backing wide-column store, abstracted to the operations the
/// journal's write, delete, and probe paths need (statement shapes
/// live inside implementations of this trait).
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Eagerly prepares every statement this configuration will need
    ///. `support_deletes` gates the delete/deleted-to statements;
    /// `cassandra_2x_compat` picks compatibility-mode delete statements
    /// over range-mode ones. Implementations with no prepared-statement
    /// concept (e.g. an in-memory store) return an empty report.
    async fn prewarm(&self, support_deletes: bool, cassandra_2x_compat: bool) -> anyhow::Result<PrewarmReport>;

    /// Writes `rows` as a single unlogged batch. All rows are assumed to
    /// have already passed the partition-span precondition; this
    /// call does not re-check it.
    async fn write_batch(&self, rows: &[SerializedEvent]) -> anyhow::Result<()>;

    /// Highest `sequence_nr` stored in `partition_nr` for `pid`, or `None`
    /// if the partition has no rows. Tolerates a partition whose
    /// rows were physically deleted but whose presence marker remains.
    async fn highest_sequence_nr_in_partition(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
    ) -> anyhow::Result<Option<SequenceNr>>;

    /// Lowest `sequence_nr` strictly greater than `after` for `pid`,
    /// scanning forward, or `None` if no such row exists.
    async fn lowest_sequence_nr_after(
        &self,
        pid: &str,
        after: SequenceNr,
    ) -> anyhow::Result<Option<SequenceNr>>;

    /// Reads the `deleted_to` marker for `pid`, or `None` if absent.
    async fn read_deleted_to(&self, pid: &str) -> anyhow::Result<Option<SequenceNr>>;

    /// Upserts the `deleted_to` marker for `pid`.
    async fn upsert_deleted_to(&self, pid: &str, to_seq: SequenceNr) -> anyhow::Result<()>;

    /// Range-mode physical delete: deletes
    /// every row in `partition_nr` with `sequence_nr <= to_seq`.
    async fn delete_partition_range(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
        to_seq: SequenceNr,
    ) -> anyhow::Result<()>;

    /// Compatibility-mode physical delete: deletes exactly the rows named in `seq_numbers` from
    /// `partition_nr`, as a single unlogged batch of per-row deletes. The
    /// caller has already chunked `seq_numbers` to `max_message_batch_size`.
    async fn delete_rows(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
        seq_numbers: &[SequenceNr],
    ) -> anyhow::Result<()>;

    /// Compatibility-mode partition bounds, read from the older schema's
    /// static marker column. Only consulted when
    /// `cassandra_2x_compat` is set; range-mode deployments never probe
    /// this.
    async fn partition_info(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
    ) -> anyhow::Result<Option<PartitionInfo>>;

    /// Reads committed rows for `pid` with `sequence_nr` in
    /// `[from_seq, to_seq]`, ascending, capped at `max_events`, exactly
    /// once. Rows at or below `deleted_to` are *not*
    /// filtered here — see `journal::replay` for that enforcement — this
    /// returns what physically exists in storage.
    async fn read_events(
        &self,
        pid: &PersistenceId,
        from_seq: SequenceNr,
        to_seq: SequenceNr,
        max_events: u64,
    ) -> anyhow::Result<Vec<SerializedEvent>>;
}
