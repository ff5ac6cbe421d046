//! Transactional save of a project-data batch.
//!
//! One call validates every dynamic name, opens one transaction, upserts all
//! changed rows, deletes in the configured dependency order, and commits. Any
//! failure rolls the whole batch back; callers only ever see a
//! [`SaveResult`].

#![allow(clippy::result_large_err)]

use std::time::Instant;

use instructa_core::model::{
    changes::row_primary_key, ENTITY_ID_COLUMN, INSTRUCTION_ENTITY, INSTRUCTION_TABLE,
    PRIMARY_KEY_COLUMN, SOURCE_LANGUAGE_COLUMN, TRANSLATIONS_TABLE, UPDATED_AT_COLUMN,
};
use instructa_core::rules::validate_batch;
use instructa_core::{
    to_storage_value, AuditChangeType, InstructaError, ProjectChanges, Row, SaveConfig,
    SaveResult, StorageValue,
};
use instructa_store::audit::now_timestamp;
use instructa_store::errors::{from_rusqlite, Result};
use instructa_store::{AuditRecorder, ProjectRepo, TableSchemaCache};
use rusqlite::{Connection, TransactionBehavior};

/// Operation name used on the start/end log events
pub const OP_SAVE_PROJECT_DATA: &str = "save_project_data";

/// Counters for one committed save
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveStats {
    pub rows_upserted: usize,
    pub rows_deleted: usize,
    pub translations_deleted: usize,
    pub rows_backfilled: usize,
    pub audit_rows: usize,
    pub skipped_entities: usize,
}

/// Apply `changes` to the project database behind `conn`.
///
/// Never fails: validation errors, storage errors and constraint violations
/// all come back as `SaveResult { success: false, error }` after a full
/// rollback. The connection is owned by the caller and stays open.
pub fn save_project_data(
    conn: &mut Connection,
    changes: &ProjectChanges,
    config: &SaveConfig,
) -> SaveResult {
    let start = Instant::now();
    instructa_core::log_op_start!(
        OP_SAVE_PROJECT_DATA,
        entities = changes.changed.len(),
        rows = changes.upserted_row_count(),
        delete_ids = changes.deleted_id_count()
    );

    match apply_changes(conn, changes, config) {
        Ok(stats) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            instructa_core::log_op_end!(
                OP_SAVE_PROJECT_DATA,
                duration_ms = duration_ms,
                rows_upserted = stats.rows_upserted,
                rows_deleted = stats.rows_deleted,
                audit_rows = stats.audit_rows
            );
            SaveResult::ok()
        }
        Err(err) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            instructa_core::log_op_error!(OP_SAVE_PROJECT_DATA, err.clone(), duration_ms = duration_ms);
            SaveResult::failed(err.to_string())
        }
    }
}

/// Fallible core of [`save_project_data`], returning what was done.
///
/// # Errors
///
/// - `InvalidIdentifier`: a table or column name failed validation; nothing
///   was opened or written
/// - `InvalidInput`: a row had no usable `id`; the transaction was rolled back
/// - `Persistence` / `ConstraintViolation`: the storage engine rejected a
///   statement; the transaction was rolled back
pub fn apply_changes(
    conn: &mut Connection,
    changes: &ProjectChanges,
    config: &SaveConfig,
) -> Result<SaveStats> {
    validate_batch(changes, config)?;

    if changes.is_empty() {
        return Ok(SaveStats::default());
    }

    // Take the write lock up front; the host serializes saves per project
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;

    let stats = {
        let mut session = SaveSession::new(&tx, config);
        session.upsert_phase(changes)?;
        session.delete_phase(changes)?;
        session.stats
    };

    tx.commit().map_err(from_rusqlite)?;
    Ok(stats)
}

/// Order entities are upserted in: the instruction first, then entities
/// named in `delete_order` from parent to child, then everything else.
fn upsert_order<'c>(
    changes: &'c ProjectChanges,
    config: &'c SaveConfig,
) -> Vec<(&'c str, &'c [Row])> {
    let mut ordered: Vec<(&str, &[Row])> = Vec::with_capacity(changes.changed.len());

    if let Some(rows) = changes.changed.get(INSTRUCTION_ENTITY) {
        ordered.push((INSTRUCTION_ENTITY, rows.as_slice()));
    }
    for entity in config.delete_order.iter().rev() {
        if entity == INSTRUCTION_ENTITY || ordered.iter().any(|(e, _)| e == entity) {
            continue;
        }
        if let Some(rows) = changes.changed.get(entity) {
            ordered.push((entity.as_str(), rows.as_slice()));
        }
    }
    for (entity, rows) in &changes.changed {
        if !ordered.iter().any(|(e, _)| e == entity) {
            ordered.push((entity.as_str(), rows.as_slice()));
        }
    }

    ordered
}

/// State for one transaction's worth of work
struct SaveSession<'c> {
    conn: &'c Connection,
    config: &'c SaveConfig,
    schema: TableSchemaCache,
    audit: AuditRecorder<'c>,
    stats: SaveStats,
}

impl<'c> SaveSession<'c> {
    fn new(conn: &'c Connection, config: &'c SaveConfig) -> Self {
        Self {
            conn,
            config,
            schema: TableSchemaCache::new(),
            audit: AuditRecorder::new(config),
            stats: SaveStats::default(),
        }
    }

    fn upsert_phase(&mut self, changes: &ProjectChanges) -> Result<()> {
        let instruction_ids: Vec<StorageValue> = changes
            .changed
            .get(INSTRUCTION_ENTITY)
            .into_iter()
            .flatten()
            .filter_map(|row| row.get(PRIMARY_KEY_COLUMN).map(to_storage_value))
            .filter(|id| !id.is_null())
            .collect();

        for (entity, rows) in upsert_order(changes, self.config) {
            self.upsert_entity(entity, rows, &instruction_ids)?;
        }
        Ok(())
    }

    fn upsert_entity(
        &mut self,
        entity: &str,
        rows: &[Row],
        instruction_ids: &[StorageValue],
    ) -> Result<()> {
        let config = self.config;
        let Some(table) = config.resolve_table(entity) else {
            tracing::debug!(entity, "Entity not in allowed tables; skipping");
            self.stats.skipped_entities += 1;
            return Ok(());
        };

        let info = self.schema.table_info(self.conn, table)?;
        if !info.exists() {
            tracing::debug!(entity, table, "Table missing from this database; skipping");
            self.stats.skipped_entities += 1;
            return Ok(());
        }

        let stamps_updated_at = entity == INSTRUCTION_ENTITY && info.has_column(UPDATED_AT_COLUMN);
        let now = now_timestamp();

        for (index, row) in rows.iter().enumerate() {
            if row_primary_key(row).is_none() {
                return Err(InstructaError::MissingPrimaryKey {
                    table: table.to_string(),
                    index,
                }
                .into());
            }
            let id = to_storage_value(&row[PRIMARY_KEY_COLUMN]);

            let mut values = Vec::with_capacity(row.len());
            for (column, value) in row {
                if column == PRIMARY_KEY_COLUMN {
                    continue;
                }
                if !info.has_column(column) {
                    tracing::debug!(table, column = column.as_str(), "Unknown column; skipping");
                    continue;
                }
                values.push((column.clone(), to_storage_value(value)));
            }

            let pre_existing = ProjectRepo::upsert_row(self.conn, table, &id, &values)?;
            self.stats.rows_upserted += 1;

            // Only the instruction rows in this batch get a fresh updated_at
            if stamps_updated_at {
                ProjectRepo::touch_updated_at(self.conn, table, &id, &now)?;
            }

            if self.audit.is_audited(table) {
                if let Some(snapshot) = ProjectRepo::read_row(self.conn, table, &id)? {
                    let change_type = AuditChangeType::for_upsert(pre_existing);
                    if self
                        .audit
                        .record(self.conn, &mut self.schema, table, &snapshot, change_type)?
                    {
                        self.stats.audit_rows += 1;
                    }
                }
            }
        }

        if config.backfills_source_language(table) && info.has_column(SOURCE_LANGUAGE_COLUMN) {
            self.backfill_source_language(table, instruction_ids)?;
        }

        Ok(())
    }

    /// Corrective sweep over the whole table, not just the rows in this batch
    fn backfill_source_language(
        &mut self,
        table: &str,
        instruction_ids: &[StorageValue],
    ) -> Result<()> {
        let instructions = self.schema.table_info(self.conn, INSTRUCTION_TABLE)?;
        if !instructions.has_column(SOURCE_LANGUAGE_COLUMN) {
            return Ok(());
        }

        match ProjectRepo::project_source_language(self.conn, instruction_ids)? {
            Some(language) => {
                let updated = ProjectRepo::backfill_source_language(self.conn, table, &language)?;
                if updated > 0 {
                    tracing::debug!(table, updated, language = language.as_str(), "Backfilled source language");
                }
                self.stats.rows_backfilled += updated;
            }
            None => {
                tracing::debug!(table, "No project source language; backfill skipped");
            }
        }
        Ok(())
    }

    fn delete_phase(&mut self, changes: &ProjectChanges) -> Result<()> {
        let config = self.config;
        for key in changes.deleted.keys() {
            let entity = ProjectChanges::entity_for_deletion_key(key);
            if !config.delete_order.iter().any(|t| t == entity) {
                tracing::debug!(key = key.as_str(), "Deletion key not in delete order; ignoring");
            }
        }

        for entity in &config.delete_order {
            let ids = changes.deleted_ids(entity);
            if ids.is_empty() {
                continue;
            }

            let Some(table) = config.resolve_table(entity) else {
                tracing::debug!(entity = entity.as_str(), "Entity not in allowed tables; skipping deletes");
                self.stats.skipped_entities += 1;
                continue;
            };
            if !self.schema.table_info(self.conn, table)?.exists() {
                tracing::debug!(table, "Table missing from this database; skipping deletes");
                self.stats.skipped_entities += 1;
                continue;
            }

            for id in ids {
                let id = StorageValue::Text(id.clone());
                self.delete_row(table, &id)?;

                if config.cleanup_translations_on_delete && table != TRANSLATIONS_TABLE {
                    self.delete_translations_for(&id)?;
                }
            }
        }
        Ok(())
    }

    fn delete_row(&mut self, table: &str, id: &StorageValue) -> Result<()> {
        // Snapshot must be read before the row disappears
        if self.audit.is_audited(table) {
            if let Some(snapshot) = ProjectRepo::read_row(self.conn, table, id)? {
                if self.audit.record(
                    self.conn,
                    &mut self.schema,
                    table,
                    &snapshot,
                    AuditChangeType::Delete,
                )? {
                    self.stats.audit_rows += 1;
                }
            }
        }

        self.stats.rows_deleted += ProjectRepo::delete_row(self.conn, table, id)?;
        Ok(())
    }

    fn delete_translations_for(&mut self, entity_id: &StorageValue) -> Result<()> {
        let translations = self.schema.table_info(self.conn, TRANSLATIONS_TABLE)?;
        if !translations.has_column(ENTITY_ID_COLUMN) {
            return Ok(());
        }

        if self.audit.is_audited(TRANSLATIONS_TABLE) {
            let snapshots = ProjectRepo::read_rows_where(
                self.conn,
                TRANSLATIONS_TABLE,
                ENTITY_ID_COLUMN,
                entity_id,
            )?;
            for snapshot in &snapshots {
                if self.audit.record(
                    self.conn,
                    &mut self.schema,
                    TRANSLATIONS_TABLE,
                    snapshot,
                    AuditChangeType::Delete,
                )? {
                    self.stats.audit_rows += 1;
                }
            }
        }

        self.stats.translations_deleted += ProjectRepo::delete_rows_where(
            self.conn,
            TRANSLATIONS_TABLE,
            ENTITY_ID_COLUMN,
            entity_id,
        )?;
        Ok(())
    }
}
