use serde::{Deserialize, Serialize};

/// Kind of change recorded in an audit table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditChangeType {
    Create,
    Update,
    Delete,
}

impl AuditChangeType {
    /// Literal written to the audit table's `change_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditChangeType::Create => "create",
            AuditChangeType::Update => "update",
            AuditChangeType::Delete => "delete",
        }
    }

    /// Classify an upsert by whether its primary key already existed
    pub fn for_upsert(pre_existing: bool) -> Self {
        if pre_existing {
            AuditChangeType::Update
        } else {
            AuditChangeType::Create
        }
    }
}

impl std::fmt::Display for AuditChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
