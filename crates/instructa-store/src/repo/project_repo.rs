//! Dynamic-table row operations
//!
//! Every table and column name passes through `quote_identifier` before it is
//! formatted into SQL; values are always bound as parameters.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use instructa_core::model::{
    INSTRUCTION_TABLE, PRIMARY_KEY_COLUMN, SOURCE_LANGUAGE_COLUMN, UPDATED_AT_COLUMN,
};
use instructa_core::rules::identifier::quote_identifier;
use instructa_core::StorageValue;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use crate::errors::{table_error, Result};

/// Full copy of one stored row: column name to value
pub type RowSnapshot = BTreeMap<String, StorageValue>;

/// Bindable form of a coerced value
pub fn sql_value(value: &StorageValue) -> Value {
    match value {
        StorageValue::Null => Value::Null,
        StorageValue::Integer(i) => Value::Integer(*i),
        StorageValue::Real(r) => Value::Real(*r),
        StorageValue::Text(s) => Value::Text(s.clone()),
    }
}

fn storage_value(value: ValueRef<'_>) -> StorageValue {
    match value {
        ValueRef::Null => StorageValue::Null,
        ValueRef::Integer(i) => StorageValue::Integer(i),
        ValueRef::Real(r) => StorageValue::Real(r),
        ValueRef::Text(t) => StorageValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => StorageValue::Text(hex::encode(b)),
    }
}

fn snapshot_row(row: &Row<'_>, names: &[String]) -> rusqlite::Result<RowSnapshot> {
    let mut snapshot = RowSnapshot::new();
    for (idx, name) in names.iter().enumerate() {
        snapshot.insert(name.clone(), storage_value(row.get_ref(idx)?));
    }
    Ok(snapshot)
}

/// SQLite repository for instruction-project tables
pub struct ProjectRepo;

impl ProjectRepo {
    /// Whether a row with primary key `id` exists in `table`
    pub fn row_exists(conn: &Connection, table: &str, id: &StorageValue) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1",
            quote_identifier(table)?,
            quote_identifier(PRIMARY_KEY_COLUMN)?
        );
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.exists([sql_value(id)]))
            .map_err(|e| table_error("row_exists", table, e))
    }

    /// Read the full row with primary key `id`
    pub fn read_row(
        conn: &Connection,
        table: &str,
        id: &StorageValue,
    ) -> Result<Option<RowSnapshot>> {
        let rows = Self::read_rows_where(conn, table, PRIMARY_KEY_COLUMN, id)?;
        Ok(rows.into_iter().next())
    }

    /// Read every row of `table` whose `column` equals `value`, in rowid order
    pub fn read_rows_where(
        conn: &Connection,
        table: &str,
        column: &str,
        value: &StorageValue,
    ) -> Result<Vec<RowSnapshot>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 ORDER BY rowid",
            quote_identifier(table)?,
            quote_identifier(column)?
        );
        Self::query_snapshots(conn, table, &sql, [sql_value(value)])
    }

    /// Read every row of `table`, in rowid order
    pub fn list_rows(conn: &Connection, table: &str) -> Result<Vec<RowSnapshot>> {
        let sql = format!("SELECT * FROM {} ORDER BY rowid", quote_identifier(table)?);
        Self::query_snapshots(conn, table, &sql, [])
    }

    fn query_snapshots<P: rusqlite::Params>(
        conn: &Connection,
        table: &str,
        sql: &str,
        params: P,
    ) -> Result<Vec<RowSnapshot>> {
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| table_error("read_rows", table, e))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params, |row| snapshot_row(row, &names))
            .map_err(|e| table_error("read_rows", table, e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| table_error("read_rows", table, e))?;
        Ok(rows)
    }

    /// Insert a row, or update the listed columns if its primary key exists
    ///
    /// `columns` excludes the primary key. An existing row gets a plain
    /// `UPDATE` of just those columns, so NOT NULL columns the caller did not
    /// send keep their stored values instead of failing the insert attempt.
    /// Returns whether the row existed beforehand.
    pub fn upsert_row(
        conn: &Connection,
        table: &str,
        id: &StorageValue,
        columns: &[(String, StorageValue)],
    ) -> Result<bool> {
        if Self::row_exists(conn, table, id)? {
            Self::update_row(conn, table, id, columns)?;
            Ok(true)
        } else {
            Self::insert_row(conn, table, id, columns)?;
            Ok(false)
        }
    }

    /// Insert a new row; a row already holding `id` is left as is
    pub fn insert_row(
        conn: &Connection,
        table: &str,
        id: &StorageValue,
        columns: &[(String, StorageValue)],
    ) -> Result<usize> {
        let quoted_pk = quote_identifier(PRIMARY_KEY_COLUMN)?;

        let mut names = vec![quoted_pk.clone()];
        let mut values = vec![sql_value(id)];
        for (column, value) in columns.iter().filter(|(c, _)| c != PRIMARY_KEY_COLUMN) {
            names.push(quote_identifier(column)?);
            values.push(sql_value(value));
        }
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO NOTHING",
            quote_identifier(table)?,
            names.join(", "),
            placeholders.join(", "),
            quoted_pk
        );
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
            .map_err(|e| table_error("insert_row", table, e))
    }

    /// Overwrite the listed columns of the row with primary key `id`
    ///
    /// Columns not listed are untouched. With nothing to set this is a no-op.
    pub fn update_row(
        conn: &Connection,
        table: &str,
        id: &StorageValue,
        columns: &[(String, StorageValue)],
    ) -> Result<usize> {
        let mut assignments = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len() + 1);
        for (column, value) in columns.iter().filter(|(c, _)| c != PRIMARY_KEY_COLUMN) {
            values.push(sql_value(value));
            assignments.push(format!("{} = ?{}", quote_identifier(column)?, values.len()));
        }
        if assignments.is_empty() {
            return Ok(0);
        }
        values.push(sql_value(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_identifier(table)?,
            assignments.join(", "),
            quote_identifier(PRIMARY_KEY_COLUMN)?,
            values.len()
        );
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
            .map_err(|e| table_error("update_row", table, e))
    }

    /// Delete the row with primary key `id`; returns rows removed
    pub fn delete_row(conn: &Connection, table: &str, id: &StorageValue) -> Result<usize> {
        Self::delete_rows_where(conn, table, PRIMARY_KEY_COLUMN, id)
    }

    /// Delete every row whose `column` equals `value`; returns rows removed
    pub fn delete_rows_where(
        conn: &Connection,
        table: &str,
        column: &str,
        value: &StorageValue,
    ) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_identifier(table)?,
            quote_identifier(column)?
        );
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute([sql_value(value)]))
            .map_err(|e| table_error("delete_rows", table, e))
    }

    /// Stamp `updated_at` on exactly one row
    pub fn touch_updated_at(
        conn: &Connection,
        table: &str,
        id: &StorageValue,
        timestamp: &str,
    ) -> Result<usize> {
        let sql = format!(
            "UPDATE {} SET {} = ?1 WHERE {} = ?2",
            quote_identifier(table)?,
            quote_identifier(UPDATED_AT_COLUMN)?,
            quote_identifier(PRIMARY_KEY_COLUMN)?
        );
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute([Value::Text(timestamp.to_string()), sql_value(id)]))
            .map_err(|e| table_error("touch_updated_at", table, e))
    }

    /// Source language of the project's instruction
    ///
    /// Prefers the first of `preferred_ids` that has one, then falls back to
    /// the earliest instruction row with a text source language. Non-text
    /// values left by older files are ignored.
    pub fn project_source_language(
        conn: &Connection,
        preferred_ids: &[StorageValue],
    ) -> Result<Option<String>> {
        for id in preferred_ids {
            let language = conn
                .query_row(
                    "SELECT source_language FROM instructions WHERE id = ?1 AND typeof(source_language) = 'text'",
                    [sql_value(id)],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(|e| table_error("project_source_language", INSTRUCTION_TABLE, e))?;
            if language.is_some() {
                return Ok(language);
            }
        }

        conn.query_row(
            "SELECT source_language FROM instructions WHERE typeof(source_language) = 'text' ORDER BY rowid LIMIT 1",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| table_error("project_source_language", INSTRUCTION_TABLE, e))
    }

    /// Set `source_language` on every row of `table` where it is null
    pub fn backfill_source_language(conn: &Connection, table: &str, language: &str) -> Result<usize> {
        let sql = format!(
            "UPDATE {0} SET {1} = ?1 WHERE {1} IS NULL",
            quote_identifier(table)?,
            quote_identifier(SOURCE_LANGUAGE_COLUMN)?
        );
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute([language]))
            .map_err(|e| table_error("backfill_source_language", table, e))
    }
}
