use crate::error::StorageError;
use crate::record::Record;
use crate::record_id::RecordId;
use crate::token::Token;
use async_trait::async_trait;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Field name reported by [`StorageError::Conflict`] for token uniqueness violations.
pub const TOKEN_FIELD: &str = "token";
/// Field name reported by [`StorageError::Conflict`] for duplicate primary ids.
pub const ID_FIELD: &str = "id";

/// Which records a bulk scan should visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    All,
    MissingToken,
}

/// A read-only view of a record store.
///
/// Results that contain several records come back in the store's natural
/// order (ascending [`RecordId`]), not in the order they were asked for.
#[async_trait]
pub trait ReadStore: Send + Sync + 'static {
    /// Retrieves a record by its primary id.
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Retrieves a record by its token.
    ///
    /// If a missing unique index let several records share a token, the
    /// first one in natural order is returned.
    async fn find_by_token(&self, token: &Token) -> Result<Option<Record>>;

    /// Retrieves every record whose id is in `ids`.
    async fn find_by_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>>;

    /// Retrieves every record whose token is in `tokens`.
    async fn find_by_tokens(&self, tokens: &[Token]) -> Result<Vec<Record>>;

    /// Lists the ids of the records selected by `scan`.
    async fn scan(&self, scan: Scan) -> Result<Vec<RecordId>>;
}

#[async_trait]
pub trait Store: ReadStore {
    /// Inserts a new record.
    ///
    /// Returns `Err(Conflict { field: "token", .. })` if the unique token index
    /// rejects the write, and `Err(Conflict { field: "id", .. })` if the id is taken.
    async fn create(&self, record: &Record) -> Result<()>;

    /// Sets (or clears, with `None`) the token of an existing record.
    ///
    /// Returns `Err(NotFound)` if no record has this id, and
    /// `Err(Conflict { field: "token", .. })` if the token is held by another record.
    async fn update_token(&self, id: &RecordId, token: Option<&Token>) -> Result<()>;

    /// Sets the token of an existing record only if it has none yet.
    ///
    /// Returns `Ok(false)` and leaves the record untouched if it already
    /// carries a token. The check and the write are one atomic step, so a
    /// token set by a concurrent writer is never overwritten.
    /// Errors as [`update_token`](Self::update_token).
    async fn update_token_if_unset(&self, id: &RecordId, token: &Token) -> Result<bool>;
}
