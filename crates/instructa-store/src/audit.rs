//! Change-audit recording
//!
//! Each audited data table `T` has its own audit table, declared through
//! `SaveConfig::audit_table_map`. An audit row is the intersection of the row
//! snapshot with the audit table's columns, plus `change_type` and
//! `changed_at`. Audit inserts run on the caller's transaction, so a failed
//! audit write fails the whole save.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use instructa_core::model::{CHANGED_AT_COLUMN, CHANGE_TYPE_COLUMN};
use instructa_core::rules::identifier::quote_identifier;
use instructa_core::{AuditChangeType, ExError, ExErrorKind, SaveConfig};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use crate::errors::{table_error, Result};
use crate::repo::project_repo::sql_value;
use crate::repo::RowSnapshot;
use crate::schema::TableSchemaCache;

/// Current time as written to `changed_at` and `updated_at`
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Writes audit rows for the tables a save config maps to audit tables
#[derive(Debug, Clone, Copy)]
pub struct AuditRecorder<'a> {
    audit_tables: &'a BTreeMap<String, String>,
}

impl<'a> AuditRecorder<'a> {
    pub fn new(config: &'a SaveConfig) -> Self {
        Self {
            audit_tables: &config.audit_table_map,
        }
    }

    /// Whether changes to `table` are audited at all
    pub fn is_audited(&self, table: &str) -> bool {
        self.audit_tables.contains_key(table)
    }

    /// Append one audit row for `table`.
    ///
    /// Returns `false` without touching the database when `table` has no
    /// audit table configured. For deletes, `snapshot` must be the full row as
    /// it was before removal.
    ///
    /// # Errors
    ///
    /// `Persistence` when the configured audit table does not exist in this
    /// database file, or when the insert fails.
    pub fn record(
        &self,
        conn: &Connection,
        schema: &mut TableSchemaCache,
        table: &str,
        snapshot: &RowSnapshot,
        change_type: AuditChangeType,
    ) -> Result<bool> {
        let Some(audit_table) = self.audit_tables.get(table) else {
            return Ok(false);
        };

        let audit_info = schema.table_info(conn, audit_table)?;
        if !audit_info.exists() {
            return Err(ExError::new(ExErrorKind::Persistence)
                .with_op("record_audit")
                .with_table(audit_table.as_str())
                .with_message(format!("audit table for {} does not exist", table)));
        }

        let own_key: Vec<&str> = audit_info.primary_key_columns().collect();
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (column, value) in snapshot {
            if own_key.contains(&column.as_str())
                || column == CHANGE_TYPE_COLUMN
                || column == CHANGED_AT_COLUMN
                || !audit_info.has_column(column)
            {
                continue;
            }
            columns.push(quote_identifier(column)?);
            values.push(sql_value(value));
        }

        columns.push(quote_identifier(CHANGE_TYPE_COLUMN)?);
        values.push(Value::Text(change_type.as_str().to_string()));
        columns.push(quote_identifier(CHANGED_AT_COLUMN)?);
        values.push(Value::Text(now_timestamp()));

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(audit_table)?,
            columns.join(", "),
            placeholders.join(", ")
        );

        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
            .map_err(|e| table_error("record_audit", audit_table, e))?;

        tracing::debug!(
            table,
            audit_table = audit_table.as_str(),
            change_type = change_type.as_str(),
            "Recorded audit row"
        );

        Ok(true)
    }
}
