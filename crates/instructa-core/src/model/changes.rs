use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DELETION_KEY_SUFFIX, PRIMARY_KEY_COLUMN};

/// One row object: column name to JSON value. Only changed columns need be present.
pub type Row = Map<String, Value>;

/// A batch of in-memory edits submitted in one save call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectChanges {
    /// Logical entity name -> rows to upsert, in submission order
    #[serde(default)]
    pub changed: BTreeMap<String, Vec<Row>>,

    /// Deletion key (`<entity>_ids`) -> primary keys to remove
    #[serde(default)]
    pub deleted: BTreeMap<String, Vec<String>>,
}

impl ProjectChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue rows for upsert under `entity`
    pub fn with_changed(mut self, entity: impl Into<String>, rows: Vec<Row>) -> Self {
        self.changed.entry(entity.into()).or_default().extend(rows);
        self
    }

    /// Queue ids for deletion from `entity`, keyed by its deletion key
    pub fn with_deleted<I, S>(mut self, entity: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deleted
            .entry(Self::deletion_key(entity))
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// True when the batch carries no rows and no ids at all
    pub fn is_empty(&self) -> bool {
        self.changed.values().all(Vec::is_empty) && self.deleted.values().all(Vec::is_empty)
    }

    /// `steps` -> `steps_ids`
    pub fn deletion_key(entity: &str) -> String {
        format!("{}{}", entity, DELETION_KEY_SUFFIX)
    }

    /// `steps_ids` -> `steps`; keys without the suffix are returned unchanged
    pub fn entity_for_deletion_key(key: &str) -> &str {
        key.strip_suffix(DELETION_KEY_SUFFIX).unwrap_or(key)
    }

    /// Ids queued for deletion from `entity`, empty if none
    pub fn deleted_ids(&self, entity: &str) -> &[String] {
        self.deleted
            .get(&Self::deletion_key(entity))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn upserted_row_count(&self) -> usize {
        self.changed.values().map(Vec::len).sum()
    }

    pub fn deleted_id_count(&self) -> usize {
        self.deleted.values().map(Vec::len).sum()
    }
}

/// Primary key of a row, if it carries a usable one
///
/// Strings and integers are accepted; a missing or null `id` is not.
pub fn row_primary_key(row: &Row) -> Option<String> {
    match row.get(PRIMARY_KEY_COLUMN)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
