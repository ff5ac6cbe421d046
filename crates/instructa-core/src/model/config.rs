use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{INSTRUCTION_ENTITY, INSTRUCTION_TABLE, TRANSLATIONS_TABLE};

fn default_true() -> bool {
    true
}

/// Per-call save policy supplied alongside a [`ProjectChanges`](super::ProjectChanges) batch
///
/// Deserializes from the same camelCase JSON the editor sends over IPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConfig {
    /// Tables a batch may touch. `"instruction"` is always allowed implicitly.
    #[serde(default)]
    pub allowed_tables: BTreeSet<String>,

    /// Order deletions run in, children before parents
    #[serde(default)]
    pub delete_order: Vec<String>,

    /// Purge `translations` rows whose `entity_id` matches a deleted id
    #[serde(default = "default_true")]
    pub cleanup_translations_on_delete: bool,

    /// Tables whose null `source_language` values get backfilled
    #[serde(default)]
    pub source_language_backfill_tables: Vec<String>,

    /// Data table -> audit-log table. Tables absent here are not audited.
    #[serde(default)]
    pub audit_table_map: BTreeMap<String, String>,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            allowed_tables: BTreeSet::new(),
            delete_order: Vec::new(),
            cleanup_translations_on_delete: true,
            source_language_backfill_tables: Vec::new(),
            audit_table_map: BTreeMap::new(),
        }
    }
}

impl SaveConfig {
    /// Config allowing `tables`, deleting in the listed order
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let delete_order: Vec<String> = tables.into_iter().map(Into::into).collect();
        Self {
            allowed_tables: delete_order.iter().cloned().collect(),
            delete_order,
            ..Self::default()
        }
    }

    /// Standard instruction-project layout
    ///
    /// Matches the tables created by the store's embedded migrations:
    /// leaf tables delete first, source language is backfilled on steps and
    /// substeps, and both of those are audited.
    pub fn instruction_project() -> Self {
        Self::new([
            "viewport_keyframes",
            "substep_images",
            TRANSLATIONS_TABLE,
            "substeps",
            "steps",
        ])
        .with_backfill_tables(["steps", "substeps"])
        .with_audit_table("steps", "audit_steps")
        .with_audit_table("substeps", "audit_substeps")
    }

    pub fn with_delete_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delete_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_translation_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup_translations_on_delete = enabled;
        self
    }

    pub fn with_backfill_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_language_backfill_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audit_table(mut self, table: impl Into<String>, audit: impl Into<String>) -> Self {
        self.audit_table_map.insert(table.into(), audit.into());
        self
    }

    /// Physical table for a logical entity, or `None` if it is not permitted.
    ///
    /// `"instruction"` always resolves to the instruction table regardless of
    /// the whitelist; anything else must be listed in `allowed_tables`.
    pub fn resolve_table<'a>(&'a self, entity: &'a str) -> Option<&'a str> {
        if entity == INSTRUCTION_ENTITY {
            Some(INSTRUCTION_TABLE)
        } else if self.allowed_tables.contains(entity) {
            Some(entity)
        } else {
            None
        }
    }

    pub fn audit_table_for(&self, table: &str) -> Option<&str> {
        self.audit_table_map.get(table).map(String::as_str)
    }

    pub fn backfills_source_language(&self, table: &str) -> bool {
        self.source_language_backfill_tables
            .iter()
            .any(|t| t == table)
    }
}
