//! Identifier grammar for dynamically composed table and column names
//!
//! Table and column names cannot be bound as SQL parameters, so every name
//! that ends up interpolated into a statement goes through this module first.
//! Accepted grammar: `[A-Za-z_][A-Za-z0-9_]*`, at most [`MAX_IDENTIFIER_LEN`]
//! characters, not an SQL keyword, not in SQLite's reserved `sqlite_` namespace.

use crate::errors::{InstructaError, Result};

/// Longest accepted identifier
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Keywords that may never be used as a bare table or column name
const SQL_KEYWORDS: &[&str] = &[
    "ABORT", "ADD", "ALL", "ALTER", "ANALYZE", "AND", "AS", "ATTACH", "BEGIN", "BETWEEN", "BY",
    "CASCADE", "CASE", "CHECK", "COLUMN", "COMMIT", "CONSTRAINT", "CREATE", "CROSS", "DATABASE",
    "DEFAULT", "DELETE", "DETACH", "DISTINCT", "DROP", "ELSE", "END", "ESCAPE", "EXCEPT",
    "EXISTS", "EXPLAIN", "FOREIGN", "FROM", "GLOB", "GROUP", "HAVING", "IN", "INDEX", "INNER",
    "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LIMIT", "MATCH", "NOT", "NULL",
    "ON", "OR", "ORDER", "OUTER", "PRAGMA", "PRIMARY", "REFERENCES", "REINDEX", "RELEASE",
    "RENAME", "REPLACE", "RIGHT", "ROLLBACK", "SAVEPOINT", "SELECT", "SET", "TABLE", "THEN",
    "TO", "TRANSACTION", "TRIGGER", "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES",
    "VIEW", "VIRTUAL", "WHEN", "WHERE", "WITH",
];

fn invalid(name: &str, reason: impl Into<String>) -> InstructaError {
    InstructaError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Check that `name` is safe to interpolate as a table or column name.
///
/// # Errors
///
/// Returns [`InstructaError::InvalidIdentifier`] describing the first rule
/// the name breaks.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "identifier is empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(
            name,
            format!("identifier exceeds {} characters", MAX_IDENTIFIER_LEN),
        ));
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(invalid(
                name,
                format!("identifier must start with a letter or '_', found {:?}", first),
            ));
        }
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(invalid(
            name,
            format!("identifier contains forbidden character {:?}", bad),
        ));
    }

    let upper = name.to_ascii_uppercase();
    if SQL_KEYWORDS.contains(&upper.as_str()) {
        return Err(invalid(name, "identifier is a reserved SQL keyword"));
    }
    if upper.starts_with("SQLITE_") {
        return Err(invalid(name, "identifier uses the reserved 'sqlite_' prefix"));
    }

    Ok(())
}

/// Validate `name` and return it double-quoted, ready for interpolation.
///
/// # Errors
///
/// Same as [`validate_identifier`].
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}
