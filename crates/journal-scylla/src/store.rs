//! [`ScyllaStore`]: the production [`JournalStore`] backed by the `scylla`
//! driver crate.
//!
//! A session held behind the struct, a schema-creation step run once at
//! construction, and a single implementation of the core trait. The
//! prepared-statement management and the row <-> [`SerializedEvent`]
//! mapping live here since both are specific to the CQL wire format.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use scylla::transport::ExecutionProfileHandle;
use scylla::Session;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use journal_core::model::{
    MetaPayload, PartitionInfo, PartitionNr, PersistenceId, SequenceNr, SerializedEvent,
};
use journal_core::partition::PartitionMapper;
use journal_core::store::{JournalStore, PrewarmReport};

use crate::statements::{self, PreparedStatements};

/// A [`JournalStore`] backed by a live `scylla::Session` against a
/// Cassandra/Scylla cluster.
///
/// The connection pool inside `Session` and the keyspace/DDL beyond the
/// two tables this crate owns are the hosting framework's responsibility
///; this struct only creates the two tables it
/// reads and writes (`messages`, `metadata`) and manages the prepared
/// statements it issues against them.
pub struct ScyllaStore {
    session: Arc<Session>,
    keyspace: String,
    write_profile: ExecutionProfileHandle,
    read_profile: ExecutionProfileHandle,
    /// Mirrors the journal's `target_partition_size` so this store
    /// can translate a `[from_seq, to_seq]` probe or scan, which the
    /// `JournalStore` contract expresses purely in sequence-number space,
    /// into the per-partition queries Scylla's partition key demands.
    partitions: PartitionMapper,
    statements: RwLock<Option<PreparedStatements>>,
}

impl ScyllaStore {
    /// Wraps an already-connected session. The caller owns cluster
    /// addressing, authentication, and the two execution profiles; this
    /// constructor only creates the journal's own tables inside
    /// `keyspace`. `target_partition_size` must match the value the
    /// embedding journal is configured with.
    pub async fn new(
        session: Arc<Session>,
        keyspace: impl Into<String>,
        write_profile: ExecutionProfileHandle,
        read_profile: ExecutionProfileHandle,
        target_partition_size: i64,
    ) -> anyhow::Result<Self> {
        let keyspace = keyspace.into();
        session.use_keyspace(&keyspace, false).await?;
        session.query(statements::CREATE_MESSAGES_TABLE, &[]).await?;
        session.query(statements::CREATE_METADATA_TABLE, &[]).await?;

        Ok(Self {
            session,
            keyspace,
            write_profile,
            read_profile,
            partitions: PartitionMapper::new(target_partition_size),
            statements: RwLock::new(None),
        })
    }

    async fn statements(&self) -> anyhow::Result<tokio::sync::RwLockReadGuard<'_, Option<PreparedStatements>>> {
        {
            let guard = self.statements.read().await;
            if guard.is_some() {
                return Ok(guard);
            }
        }
        // Not yet prewarmed (e.g. a caller skipped `prewarm`): prepare
        // with deletes and range mode as a reasonable default rather than
        // failing every call.
        self.prewarm(true, false).await?;
        Ok(self.statements.read().await)
    }

    /// Keyspace this store's tables live in.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }
}

#[async_trait]
impl JournalStore for ScyllaStore {
    async fn prewarm(&self, support_deletes: bool, cassandra_2x_compat: bool) -> anyhow::Result<PrewarmReport> {
        let (prepared, names) = statements::prepare_all(
            &self.session,
            &self.write_profile,
            &self.read_profile,
            support_deletes,
            cassandra_2x_compat,
        )
        .await?;
        *self.statements.write().await = Some(prepared);
        debug!(prepared = names.len(), "journal-scylla: statements prewarmed");
        Ok(PrewarmReport { prepared: names })
    }

    async fn write_batch(&self, rows: &[SerializedEvent]) -> anyhow::Result<()> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");

        let mut batch = scylla::batch::Batch::new(scylla::batch::BatchType::Unlogged);
        let mut values: Vec<scylla::frame::value::SerializedValues> = Vec::with_capacity(rows.len());

        for row in rows {
            if row.has_meta() {
                batch.append_statement(stmts.insert_event_with_meta.clone());
                values.push(serialize_insert_with_meta(row)?);
            } else {
                batch.append_statement(stmts.insert_event_no_meta.clone());
                values.push(serialize_insert_no_meta(row)?);
            }
        }

        self.session.batch(&batch, values).await?;
        Ok(())
    }

    async fn highest_sequence_nr_in_partition(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
    ) -> anyhow::Result<Option<SequenceNr>> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");
        let result = self
            .session
            .execute(&stmts.select_highest_sequence_nr, (pid, partition_nr))
            .await?;
        let row = result.first_row_typed::<(SequenceNr,)>().ok();
        Ok(row.map(|(seq,)| seq))
    }

    async fn lowest_sequence_nr_after(
        &self,
        pid: &str,
        after: SequenceNr,
    ) -> anyhow::Result<Option<SequenceNr>> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");

        // `sequence_nr` only orders rows within one partition (it is part
        // of the clustering key, not the partition key), so a forward scan
        // for "the next row after `after`" walks partitions one at a time.
        // A partition can be legitimately empty (a writer skipped
        // straight to a later partition), so an empty probe alone isn't
        // proof the stream has ended; `LOOKAHEAD_PARTITIONS` bounds how far
        // past a run of empty partitions this will keep looking before
        // concluding there is nothing left.
        const LOOKAHEAD_PARTITIONS: i64 = 3;
        let start_partition = self.partitions.partition_of(after + 1);
        let mut empty_run = 0;
        let mut partition_nr = start_partition;
        while empty_run <= LOOKAHEAD_PARTITIONS {
            let result = self
                .session
                .execute(&stmts.select_lowest_sequence_nr_after, (pid, partition_nr, after))
                .await?;
            if let Ok((seq,)) = result.first_row_typed::<(SequenceNr,)>() {
                return Ok(Some(seq));
            }
            empty_run += 1;
            partition_nr += 1;
        }
        Ok(None)
    }

    async fn read_deleted_to(&self, pid: &str) -> anyhow::Result<Option<SequenceNr>> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");
        let Some(select_deleted_to) = &stmts.select_deleted_to else {
            return Ok(None);
        };
        let result = self.session.execute(select_deleted_to, (pid,)).await?;
        let row = result.first_row_typed::<(SequenceNr,)>().ok();
        Ok(row.map(|(seq,)| seq))
    }

    async fn upsert_deleted_to(&self, pid: &str, to_seq: SequenceNr) -> anyhow::Result<()> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");
        let Some(upsert_deleted_to) = &stmts.upsert_deleted_to else {
            anyhow::bail!("deletes are not supported by this store's prewarm configuration");
        };
        self.session.execute(upsert_deleted_to, (pid, to_seq)).await?;
        Ok(())
    }

    async fn delete_partition_range(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
        to_seq: SequenceNr,
    ) -> anyhow::Result<()> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");
        let Some(delete_partition_range) = &stmts.delete_partition_range else {
            anyhow::bail!("range-mode delete statement was not prepared (cassandra_2x_compat is set?)");
        };
        if let Err(err) = self
            .session
            .execute(delete_partition_range, (pid, partition_nr, to_seq))
            .await
        {
            // Physical-delete failures are swallowed: the logical delete
            // already landed and remains authoritative.
            warn!(
                pid, partition_nr, to_seq, error = %err,
                "physical delete failed, manual cleanup may be required; logical delete remains authoritative"
            );
        }
        Ok(())
    }

    async fn delete_rows(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
        seq_numbers: &[SequenceNr],
    ) -> anyhow::Result<()> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");
        let Some(delete_row) = &stmts.delete_row else {
            anyhow::bail!("compatibility-mode delete statement was not prepared (cassandra_2x_compat not set?)");
        };

        let mut batch = scylla::batch::Batch::new(scylla::batch::BatchType::Unlogged);
        let mut values = Vec::with_capacity(seq_numbers.len());
        for seq in seq_numbers {
            batch.append_statement(delete_row.clone());
            values.push((pid, partition_nr, *seq));
        }

        if let Err(err) = self.session.batch(&batch, values).await {
            warn!(
                pid, partition_nr, chunk_len = seq_numbers.len(), error = %err,
                "compatibility-mode physical delete chunk failed, manual cleanup may be required"
            );
        }
        Ok(())
    }

    async fn partition_info(
        &self,
        pid: &str,
        partition_nr: PartitionNr,
    ) -> anyhow::Result<Option<PartitionInfo>> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");
        let Some(select_partition_info) = &stmts.select_partition_info else {
            return Ok(None);
        };
        let result = self
            .session
            .execute(select_partition_info, (pid, partition_nr))
            .await?;
        let row = result
            .first_row_typed::<(Option<SequenceNr>, Option<SequenceNr>)>()
            .ok();
        Ok(row.and_then(|(min, max)| match (min, max) {
            (Some(min_sequence_nr), Some(max_sequence_nr)) => Some(PartitionInfo {
                partition_nr,
                min_sequence_nr,
                max_sequence_nr,
            }),
            _ => None,
        }))
    }

    async fn read_events(
        &self,
        pid: &PersistenceId,
        from_seq: SequenceNr,
        to_seq: SequenceNr,
        max_events: u64,
    ) -> anyhow::Result<Vec<SerializedEvent>> {
        let guard = self.statements().await?;
        let stmts = guard.as_ref().expect("prewarmed above");

        // `select_events` is scoped to one partition (partition_nr is part
        // of the partition key); a replay span can cross partitions, so
        // this walks every partition the range touches in order.
        // Callers (e.g. `replay_messages("A", 1, ∞)`) may pass
        // `to_seq == SequenceNr::MAX`, whose partition is astronomically
        // far away; scanning up to `partition_of(to_seq)` unconditionally
        // would issue one empty query per partition forever whenever the
        // stream has fewer than `max_events` rows. Bound the scan the same
        // way `lowest_sequence_nr_after` does: stop once a run of empty
        // partitions is seen, never past `partition_of(to_seq)`.
        const LOOKAHEAD_PARTITIONS: i64 = 3;
        let first_partition = self.partitions.partition_of(from_seq);
        let last_partition = self.partitions.partition_of(to_seq);

        let mut out = Vec::new();
        let mut empty_run = 0;
        let mut partition_nr = first_partition;
        while partition_nr <= last_partition && empty_run <= LOOKAHEAD_PARTITIONS {
            let result = self
                .session
                .execute(&stmts.select_events, (pid.as_str(), partition_nr, from_seq, to_seq))
                .await?;
            let mut saw_row = false;
            for row in result.rows_typed::<EventRow>()? {
                saw_row = true;
                out.push(row?.into_event());
                if out.len() as u64 >= max_events {
                    return Ok(out);
                }
            }
            empty_run = if saw_row { 0 } else { empty_run + 1 };
            partition_nr += 1;
        }
        Ok(out)
    }
}

/// Row shape returned by `SELECT_EVENTS`, matched positionally to the
/// column list in [`statements::SELECT_EVENTS`].
#[derive(scylla::FromRow)]
struct EventRow {
    persistence_id: String,
    partition_nr: PartitionNr,
    sequence_nr: SequenceNr,
    timestamp: Uuid,
    timebucket: String,
    writer_uuid: String,
    event_payload: Vec<u8>,
    ser_id: i32,
    ser_manifest: String,
    event_adapter_manifest: String,
    tags: std::collections::HashSet<String>,
    meta_payload: Option<Vec<u8>>,
    meta_ser_id: Option<i32>,
    meta_ser_manifest: Option<String>,
}

impl EventRow {
    fn into_event(self) -> SerializedEvent {
        let meta = match (self.meta_payload, self.meta_ser_id, self.meta_ser_manifest) {
            (Some(bytes), Some(ser_id), Some(ser_manifest)) => Some(MetaPayload {
                bytes,
                ser_id,
                ser_manifest,
            }),
            _ => None,
        };
        SerializedEvent {
            persistence_id: self.persistence_id,
            partition_nr: self.partition_nr,
            sequence_nr: self.sequence_nr,
            time_uuid: self.timestamp,
            time_bucket: self.timebucket,
            writer_uuid: self.writer_uuid,
            event_payload: self.event_payload,
            ser_id: self.ser_id,
            ser_manifest: self.ser_manifest,
            event_adapter_manifest: self.event_adapter_manifest,
            tags: self.tags.into_iter().collect::<BTreeSet<_>>(),
            meta,
        }
    }
}

fn serialize_insert_no_meta(row: &SerializedEvent) -> anyhow::Result<scylla::frame::value::SerializedValues> {
    let mut values = scylla::frame::value::SerializedValues::new();
    values.add_value(&row.persistence_id)?;
    values.add_value(&row.partition_nr)?;
    values.add_value(&row.sequence_nr)?;
    values.add_value(&row.time_uuid)?;
    values.add_value(&row.time_bucket)?;
    values.add_value(&row.writer_uuid)?;
    values.add_value(&row.event_payload)?;
    values.add_value(&row.ser_id)?;
    values.add_value(&row.ser_manifest)?;
    values.add_value(&row.event_adapter_manifest)?;
    values.add_value(&row.tags)?;
    Ok(values)
}

fn serialize_insert_with_meta(row: &SerializedEvent) -> anyhow::Result<scylla::frame::value::SerializedValues> {
    let mut values = serialize_insert_no_meta(row)?;
    let meta = row.meta.as_ref().expect("has_meta() checked by caller");
    values.add_value(&meta.bytes)?;
    values.add_value(&meta.ser_id)?;
    values.add_value(&meta.ser_manifest)?;
    Ok(values)
}

// No live cluster is available in this workspace's test environment, so
// these tests stay scoped to what can be exercised without a `Session`:
// row marshalling and value serialization. `ScyllaStore` itself is
// exercised indirectly by running `journal`'s coordination tests against
// `journal-memory`, which implements the same `JournalStore` contract.
#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::model::MetaPayload;

    fn ev(partition_nr: PartitionNr, seq: SequenceNr) -> SerializedEvent {
        SerializedEvent {
            persistence_id: "A".to_string(),
            partition_nr,
            sequence_nr: seq,
            time_uuid: Uuid::new_v4(),
            time_bucket: "2026-07".to_string(),
            writer_uuid: "writer-1".to_string(),
            event_payload: vec![1, 2, 3],
            ser_id: 1,
            ser_manifest: "test".to_string(),
            event_adapter_manifest: String::new(),
            tags: BTreeSet::from(["red".to_string()]),
            meta: None,
        }
    }

    #[test]
    fn serializes_row_without_meta() {
        let row = ev(0, 1);
        let values = serialize_insert_no_meta(&row).unwrap();
        assert_eq!(values.len(), 11);
    }

    #[test]
    fn serializes_row_with_meta() {
        let mut row = ev(0, 1);
        row.meta = Some(MetaPayload {
            bytes: vec![9, 9],
            ser_id: 2,
            ser_manifest: "meta-v1".to_string(),
        });
        let values = serialize_insert_with_meta(&row).unwrap();
        assert_eq!(values.len(), 14);
    }

    #[test]
    fn event_row_round_trips_without_meta() {
        let source = ev(3, 42);
        let row = EventRow {
            persistence_id: source.persistence_id.clone(),
            partition_nr: source.partition_nr,
            sequence_nr: source.sequence_nr,
            timestamp: source.time_uuid,
            timebucket: source.time_bucket.clone(),
            writer_uuid: source.writer_uuid.clone(),
            event_payload: source.event_payload.clone(),
            ser_id: source.ser_id,
            ser_manifest: source.ser_manifest.clone(),
            event_adapter_manifest: source.event_adapter_manifest.clone(),
            tags: source.tags.iter().cloned().collect(),
            meta_payload: None,
            meta_ser_id: None,
            meta_ser_manifest: None,
        };
        assert_eq!(row.into_event(), source);
    }

    #[test]
    fn partition_span_for_read_events_uses_configured_width() {
        let mapper = PartitionMapper::new(500);
        assert_eq!(mapper.partition_of(1), 0);
        assert_eq!(mapper.partition_of(500), 0);
        assert_eq!(mapper.partition_of(501), 1);
    }
}
