pub mod audit;
pub mod changes;
pub mod config;
pub mod result;

pub use audit::AuditChangeType;
pub use changes::{ProjectChanges, Row};
pub use config::SaveConfig;
pub use result::SaveResult;

/// Logical entity name that always maps to the instruction table
pub const INSTRUCTION_ENTITY: &str = "instruction";

/// Physical table backing the `"instruction"` entity
pub const INSTRUCTION_TABLE: &str = "instructions";

/// Table holding per-language text for every translatable entity
pub const TRANSLATIONS_TABLE: &str = "translations";

/// Suffix appended to a logical entity name to form its deletion key
pub const DELETION_KEY_SUFFIX: &str = "_ids";

/// Primary-key column every project table uses
pub const PRIMARY_KEY_COLUMN: &str = "id";

pub const UPDATED_AT_COLUMN: &str = "updated_at";
pub const SOURCE_LANGUAGE_COLUMN: &str = "source_language";
pub const ENTITY_ID_COLUMN: &str = "entity_id";
pub const CHANGE_TYPE_COLUMN: &str = "change_type";
pub const CHANGED_AT_COLUMN: &str = "changed_at";
