use thiserror::Error;

/// Errors raised by token validation and the record-level setter.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token already set: {0}")]
    TokenAlreadySet(String),
    #[error("invalid record id: {0}")]
    InvalidRecordId(String),
    #[error("invalid token settings: {0}")]
    InvalidSettings(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated on `{field}`: {value}")]
    Conflict { field: String, value: String },
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Builds a conflict on the given field.
    pub fn conflict(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if this is a uniqueness violation on `field`.
    pub fn is_conflict_on(&self, field: &str) -> bool {
        matches!(self, Self::Conflict { field: f, .. } if f == field)
    }
}
