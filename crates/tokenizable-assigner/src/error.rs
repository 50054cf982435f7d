use thiserror::Error;
use tokenizable_core::{CoreError, RecordId, StorageError};

pub type Result<T> = std::result::Result<T, TokenizerError>;

#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("token already set: {0}")]
    TokenAlreadySet(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("invalid record id: {0}")]
    InvalidRecordId(String),
    #[error("invalid token settings: {0}")]
    InvalidSettings(String),
    #[error("no unique token for record {record_id} after {attempts} attempts")]
    AssignmentExhausted { record_id: RecordId, attempts: u32 },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CoreError> for TokenizerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidToken(message) => Self::InvalidToken(message),
            CoreError::TokenAlreadySet(message) => Self::TokenAlreadySet(message),
            CoreError::InvalidRecordId(message) => Self::InvalidRecordId(message),
            CoreError::InvalidSettings(message) => Self::InvalidSettings(message),
        }
    }
}
