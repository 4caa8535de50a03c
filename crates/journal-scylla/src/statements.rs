//! Statement builder: schema DDL, CQL text, and the two
//! prepared-statement shapes per write operation.

use scylla::prepared_statement::PreparedStatement;
use scylla::transport::ExecutionProfileHandle;
use scylla::Session;

/// Messages table: primary key `((persistence_id, partition_nr),
/// sequence_nr, timestamp)`, ordered within partition by `sequence_nr`
///.
pub const CREATE_MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    persistence_id text,
    partition_nr bigint,
    sequence_nr bigint,
    timestamp timeuuid,
    timebucket text,
    writer_uuid text,
    event_payload blob,
    ser_id int,
    ser_manifest text,
    event_adapter_manifest text,
    tags set<text>,
    meta_payload blob,
    meta_ser_id int,
    meta_ser_manifest text,
    PRIMARY KEY ((persistence_id, partition_nr), sequence_nr, timestamp)
) WITH CLUSTERING ORDER BY (sequence_nr ASC, timestamp ASC)
"#;

/// Metadata table: `(persistence_id) -> deleted_to`.
pub const CREATE_METADATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    persistence_id text PRIMARY KEY,
    deleted_to bigint
)
"#;

const INSERT_EVENT_NO_META: &str = r#"
INSERT INTO messages
    (persistence_id, partition_nr, sequence_nr, timestamp, timebucket,
     writer_uuid, event_payload, ser_id, ser_manifest, event_adapter_manifest, tags)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_EVENT_WITH_META: &str = r#"
INSERT INTO messages
    (persistence_id, partition_nr, sequence_nr, timestamp, timebucket,
     writer_uuid, event_payload, ser_id, ser_manifest, event_adapter_manifest, tags,
     meta_payload, meta_ser_id, meta_ser_manifest)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_HIGHEST_SEQUENCE_NR: &str = r#"
SELECT sequence_nr FROM messages
WHERE persistence_id = ? AND partition_nr = ?
ORDER BY sequence_nr DESC LIMIT 1
"#;

const SELECT_LOWEST_SEQUENCE_NR_AFTER: &str = r#"
SELECT sequence_nr FROM messages
WHERE persistence_id = ? AND partition_nr = ? AND sequence_nr > ?
ORDER BY sequence_nr ASC LIMIT 1
"#;

const SELECT_EVENTS: &str = r#"
SELECT persistence_id, partition_nr, sequence_nr, timestamp, timebucket, writer_uuid,
       event_payload, ser_id, ser_manifest, event_adapter_manifest, tags,
       meta_payload, meta_ser_id, meta_ser_manifest
FROM messages
WHERE persistence_id = ? AND partition_nr = ? AND sequence_nr >= ? AND sequence_nr <= ?
"#;

const SELECT_DELETED_TO: &str = "SELECT deleted_to FROM metadata WHERE persistence_id = ?";

const UPSERT_DELETED_TO: &str = "INSERT INTO metadata (persistence_id, deleted_to) VALUES (?, ?)";

/// Range-mode physical delete: one partition-range
/// delete bound by `(pid, partition_nr, to_seq)`.
const DELETE_PARTITION_RANGE: &str = r#"
DELETE FROM messages
WHERE persistence_id = ? AND partition_nr = ? AND sequence_nr <= ?
"#;

/// Compatibility-mode per-row delete, issued inside an unlogged batch
///.
const DELETE_ROW: &str = r#"
DELETE FROM messages
WHERE persistence_id = ? AND partition_nr = ? AND sequence_nr = ?
"#;

/// Compatibility-mode partition bounds: emulates
/// the older schema's static highest-seq-in-partition marker with an
/// aggregate query over the partition. Only ever prepared/run when
/// `cassandra_2x_compat` is set.
const SELECT_PARTITION_INFO: &str = r#"
SELECT MIN(sequence_nr), MAX(sequence_nr) FROM messages
WHERE persistence_id = ? AND partition_nr = ?
"#;

/// The prepared statements a [`crate::store::ScyllaStore`] needs, grouped
/// the way the controller prepares them at startup.
pub struct PreparedStatements {
    /// [`INSERT_EVENT_WITH_META`] prepared.
    pub insert_event_with_meta: PreparedStatement,
    /// [`INSERT_EVENT_NO_META`] prepared.
    pub insert_event_no_meta: PreparedStatement,
    /// [`SELECT_HIGHEST_SEQUENCE_NR`] prepared.
    pub select_highest_sequence_nr: PreparedStatement,
    /// [`SELECT_LOWEST_SEQUENCE_NR_AFTER`] prepared.
    pub select_lowest_sequence_nr_after: PreparedStatement,
    /// [`SELECT_EVENTS`] prepared.
    pub select_events: PreparedStatement,
    /// [`SELECT_DELETED_TO`] prepared, only if `support_deletes`.
    pub select_deleted_to: Option<PreparedStatement>,
    /// [`UPSERT_DELETED_TO`] prepared, only if `support_deletes`.
    pub upsert_deleted_to: Option<PreparedStatement>,
    /// [`DELETE_PARTITION_RANGE`] prepared, only if `support_deletes`
    /// and not `cassandra_2x_compat`.
    pub delete_partition_range: Option<PreparedStatement>,
    /// [`DELETE_ROW`] prepared, only if `support_deletes` and
    /// `cassandra_2x_compat`.
    pub delete_row: Option<PreparedStatement>,
    /// [`SELECT_PARTITION_INFO`] prepared, only if `support_deletes` and
    /// `cassandra_2x_compat`.
    pub select_partition_info: Option<PreparedStatement>,
}

/// Names reported back via [`journal_core::store::PrewarmReport`], in the
/// order statements are prepared.
pub mod names {
    /// [`super::INSERT_EVENT_WITH_META`].
    pub const INSERT_EVENT_WITH_META: &str = "insert_event_with_meta";
    /// [`super::INSERT_EVENT_NO_META`].
    pub const INSERT_EVENT_NO_META: &str = "insert_event_no_meta";
    /// [`super::SELECT_HIGHEST_SEQUENCE_NR`].
    pub const SELECT_HIGHEST_SEQUENCE_NR: &str = "select_highest_sequence_nr";
    /// [`super::SELECT_LOWEST_SEQUENCE_NR_AFTER`].
    pub const SELECT_LOWEST_SEQUENCE_NR_AFTER: &str = "select_lowest_sequence_nr_after";
    /// [`super::SELECT_EVENTS`].
    pub const SELECT_EVENTS: &str = "select_events";
    /// [`super::SELECT_DELETED_TO`].
    pub const SELECT_DELETED_TO: &str = "select_deleted_to";
    /// [`super::UPSERT_DELETED_TO`].
    pub const UPSERT_DELETED_TO: &str = "upsert_deleted_to";
    /// [`super::DELETE_PARTITION_RANGE`].
    pub const DELETE_PARTITION_RANGE: &str = "delete_partition_range";
    /// [`super::DELETE_ROW`].
    pub const DELETE_ROW: &str = "delete_row";
    /// [`super::SELECT_PARTITION_INFO`].
    pub const SELECT_PARTITION_INFO: &str = "select_partition_info";
}

/// Prepares every statement class the given configuration needs,
/// attaching `write_profile` to writes and `read_profile` to reads.
///
/// The execution profiles themselves are built and owned by the caller —
/// the journal never mutates them — so this
/// takes ready-made [`ExecutionProfileHandle`]s rather than profile names.
pub async fn prepare_all(
    session: &Session,
    write_profile: &ExecutionProfileHandle,
    read_profile: &ExecutionProfileHandle,
    support_deletes: bool,
    cassandra_2x_compat: bool,
) -> anyhow::Result<(PreparedStatements, Vec<&'static str>)> {
    let mut prepared_names = Vec::new();

    async fn prepare_with(
        session: &Session,
        cql: &str,
        profile: &ExecutionProfileHandle,
    ) -> anyhow::Result<PreparedStatement> {
        let mut stmt = session.prepare(cql).await?;
        stmt.set_execution_profile_handle(Some(profile.clone()));
        Ok(stmt)
    }

    let insert_event_with_meta = prepare_with(session, INSERT_EVENT_WITH_META, write_profile).await?;
    prepared_names.push(names::INSERT_EVENT_WITH_META);
    let insert_event_no_meta = prepare_with(session, INSERT_EVENT_NO_META, write_profile).await?;
    prepared_names.push(names::INSERT_EVENT_NO_META);
    let select_highest_sequence_nr = prepare_with(session, SELECT_HIGHEST_SEQUENCE_NR, read_profile).await?;
    prepared_names.push(names::SELECT_HIGHEST_SEQUENCE_NR);
    let select_lowest_sequence_nr_after =
        prepare_with(session, SELECT_LOWEST_SEQUENCE_NR_AFTER, read_profile).await?;
    prepared_names.push(names::SELECT_LOWEST_SEQUENCE_NR_AFTER);
    let select_events = prepare_with(session, SELECT_EVENTS, read_profile).await?;
    prepared_names.push(names::SELECT_EVENTS);

    let (select_deleted_to, upsert_deleted_to, delete_partition_range, delete_row, select_partition_info) =
        if support_deletes {
            let select_deleted_to = prepare_with(session, SELECT_DELETED_TO, read_profile).await?;
            prepared_names.push(names::SELECT_DELETED_TO);
            let upsert_deleted_to = prepare_with(session, UPSERT_DELETED_TO, write_profile).await?;
            prepared_names.push(names::UPSERT_DELETED_TO);

            if cassandra_2x_compat {
                let delete_row = prepare_with(session, DELETE_ROW, write_profile).await?;
                prepared_names.push(names::DELETE_ROW);
                let select_partition_info = prepare_with(session, SELECT_PARTITION_INFO, read_profile).await?;
                prepared_names.push(names::SELECT_PARTITION_INFO);
                (Some(select_deleted_to), Some(upsert_deleted_to), None, Some(delete_row), Some(select_partition_info))
            } else {
                let delete_partition_range = prepare_with(session, DELETE_PARTITION_RANGE, write_profile).await?;
                prepared_names.push(names::DELETE_PARTITION_RANGE);
                (Some(select_deleted_to), Some(upsert_deleted_to), Some(delete_partition_range), None, None)
            }
        } else {
            (None, None, None, None, None)
        };

    Ok((
        PreparedStatements {
            insert_event_with_meta,
            insert_event_no_meta,
            select_highest_sequence_nr,
            select_lowest_sequence_nr_after,
            select_events,
            select_deleted_to,
            upsert_deleted_to,
            delete_partition_range,
            delete_row,
            select_partition_info,
        },
        prepared_names,
    ))
}
