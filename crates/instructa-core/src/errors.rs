use thiserror::Error;

/// Result type alias using InstructaError
pub type Result<T> = std::result::Result<T, InstructaError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// surfaced by the persistence engine. Each kind maps to a stable error code
/// that can be used for programmatic handling, testing, and IPC responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidIdentifier,
    InvalidInput,
    ConstraintViolation,

    // Integration
    Serialization,
    Persistence,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidIdentifier => "ERR_INVALID_IDENTIFIER",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus the table/row context the failure
/// happened in, so a failed save can be reported without losing where it broke.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    table: Option<String>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            table: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the table context, if any
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(source) = &self.source {
            write!(f, " <- {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for project-data persistence
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstructaError {
    /// A table or column name failed the identifier grammar
    #[error("Invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// A row object did not carry a usable primary key
    #[error("Row {index} of table {table} has no usable 'id' field")]
    MissingPrimaryKey { table: String, index: usize },

    /// A row object was structurally unusable
    #[error("Invalid row for table {table}: {reason}")]
    InvalidRow { table: String, reason: String },

    /// The storage engine rejected an operation
    #[error("Storage failure: {message}")]
    Storage { message: String },

    /// A payload could not be (de)serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<InstructaError> for ExError {
    fn from(err: InstructaError) -> Self {
        match err {
            InstructaError::InvalidIdentifier { name, reason } => {
                ExError::new(ExErrorKind::InvalidIdentifier)
                    .with_op("validate_identifier")
                    .with_entity_id(name)
                    .with_message(reason)
            }

            InstructaError::MissingPrimaryKey { table, index } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_table(table)
                    .with_message(format!("Row {} has no usable 'id' field", index))
            }

            InstructaError::InvalidRow { table, reason } => ExError::new(ExErrorKind::InvalidInput)
                .with_table(table)
                .with_message(reason),

            InstructaError::Storage { message } => {
                ExError::new(ExErrorKind::Persistence).with_message(message)
            }

            InstructaError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for InstructaError {
    fn from(err: serde_json::Error) -> Self {
        InstructaError::Serialization {
            message: err.to_string(),
        }
    }
}
