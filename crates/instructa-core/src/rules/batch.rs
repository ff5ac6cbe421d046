//! Pre-transaction validation of a save batch and its config

use crate::errors::Result;
use crate::model::{ProjectChanges, SaveConfig};

use super::identifier::validate_identifier;

/// Validate every name a save call could interpolate into SQL.
///
/// Covers entity keys of `changed`, deletion keys of `deleted` (after
/// stripping the `_ids` suffix), and every table named by the config. Column
/// names are checked for entities that resolve to a writable table; rows of
/// entities that will be skipped are never turned into SQL.
///
/// Whitelist membership is deliberately not enforced here: an unknown but
/// well-formed entity is skipped later, not rejected.
///
/// # Errors
///
/// Returns [`InstructaError::InvalidIdentifier`](crate::errors::InstructaError::InvalidIdentifier)
/// for the first offending name.
pub fn validate_batch(changes: &ProjectChanges, config: &SaveConfig) -> Result<()> {
    for table in &config.allowed_tables {
        validate_identifier(table)?;
    }
    for table in &config.delete_order {
        validate_identifier(table)?;
    }
    for table in &config.source_language_backfill_tables {
        validate_identifier(table)?;
    }
    for (table, audit_table) in &config.audit_table_map {
        validate_identifier(table)?;
        validate_identifier(audit_table)?;
    }

    for (entity, rows) in &changes.changed {
        validate_identifier(entity)?;
        if config.resolve_table(entity).is_none() {
            continue;
        }
        for row in rows {
            for column in row.keys() {
                validate_identifier(column)?;
            }
        }
    }

    for key in changes.deleted.keys() {
        validate_identifier(ProjectChanges::entity_for_deletion_key(key))?;
    }

    Ok(())
}
