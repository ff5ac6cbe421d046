#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::sync::Arc;

use instructa_core::rules::identifier::quote_identifier;
use rusqlite::Connection;

use crate::errors::{table_error, Result};

/// One column as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Column set of one table
///
/// A table that does not exist in this database file introspects to an empty
/// column list rather than an error, so older project files without a table
/// degrade to "skip" instead of "fail".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
    }

    fn introspect(conn: &Connection, table: &str) -> Result<Self> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table)?);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| table_error("table_info", table, e))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get("name")?,
                    decl_type: row.get("type")?,
                    not_null: row.get::<_, i64>("notnull")? != 0,
                    primary_key: row.get::<_, i64>("pk")? != 0,
                })
            })
            .map_err(|e| table_error("table_info", table, e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| table_error("table_info", table, e))?;

        Ok(Self {
            name: table.to_string(),
            columns,
        })
    }
}

/// Memoized `table -> TableInfo` lookups
///
/// Owned by whoever drives a save (normally one save call). Schemas are
/// assumed fixed at runtime; a long-lived owner that runs DDL must call
/// [`invalidate`](Self::invalidate) or [`clear`](Self::clear) afterwards.
#[derive(Debug, Default)]
pub struct TableSchemaCache {
    tables: HashMap<String, Arc<TableInfo>>,
}

impl TableSchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column set of `table`, introspecting it on first request
    ///
    /// # Errors
    ///
    /// Fails if `table` is not a valid identifier or the pragma itself fails.
    /// A missing table is not an error.
    pub fn table_info(&mut self, conn: &Connection, table: &str) -> Result<Arc<TableInfo>> {
        if let Some(info) = self.tables.get(table) {
            return Ok(Arc::clone(info));
        }

        let info = Arc::new(TableInfo::introspect(conn, table)?);
        tracing::trace!(
            table,
            columns = info.columns.len(),
            "Introspected table schema"
        );
        self.tables.insert(table.to_string(), Arc::clone(&info));
        Ok(info)
    }

    /// Forget one table so its next lookup re-introspects
    pub fn invalidate(&mut self, table: &str) {
        self.tables.remove(table);
    }

    /// Forget every cached table
    pub fn clear(&mut self) {
        self.tables.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
