use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use std::collections::BTreeMap;
use tokenizable_core::store::{Result, ID_FIELD, TOKEN_FIELD};
use tokenizable_core::{ReadStore, Record, RecordId, Scan, StorageError, Store, Token};

/// Name of the unique index on `records.token`, as declared in the DDL.
pub const TOKEN_INDEX: &str = "uniq_records_token";

const SCHEMA: &str = include_str!("../ddl/mysql/records.sql");

const SELECT_COLUMNS: &str = "SELECT id, kind, token, attributes FROM records";

/// MySQL implementation of the store contract.
///
/// Token uniqueness is enforced by the `uniq_records_token` index; a NULL
/// token means "unset" and never conflicts. The token column uses a binary
/// collation, so tokens differing only in case are distinct. Host attributes are stored as a
/// JSON document in a TEXT column.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `records` table and its unique token index if missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn exists(&self, id: &RecordId) -> Result<bool> {
        let exists = sqlx::query("SELECT 1 FROM records WHERE id = ? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .is_some();
        Ok(exists)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

/// Maps a duplicate-key error to the field whose constraint fired.
fn conflict_from(err: &sqlx::Error, id: &RecordId, token: Option<&Token>) -> StorageError {
    let message = err
        .as_database_error()
        .map(|db| db.message().to_string())
        .unwrap_or_default();

    match token {
        Some(token) if message.contains(TOKEN_INDEX) => {
            StorageError::conflict(TOKEN_FIELD, token.as_str())
        }
        _ => StorageError::conflict(ID_FIELD, id.to_string()),
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn decode_record(row: &MySqlRow) -> Result<Record> {
    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let kind: String = row.try_get("kind").map_err(map_sqlx_error)?;
    let token: Option<String> = row.try_get("token").map_err(map_sqlx_error)?;
    let attributes: String = row.try_get("attributes").map_err(map_sqlx_error)?;

    let id = RecordId::parse(&id)
        .map_err(|e| StorageError::InvalidData(format!("invalid record id '{}': {e}", id)))?;
    let attributes: BTreeMap<String, String> = serde_json::from_str(&attributes)
        .map_err(|e| StorageError::InvalidData(format!("invalid attributes for {}: {e}", id)))?;
    let token = token.filter(|t| !t.is_empty()).map(Token::new_unchecked);

    Ok(Record::from_parts(id, kind, token, attributes))
}

fn decode_all(rows: &[MySqlRow]) -> Result<Vec<Record>> {
    rows.iter().map(decode_record).collect()
}

#[async_trait]
impl ReadStore for MySqlStore {
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Record>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ? LIMIT 1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_record).transpose()
    }

    async fn find_by_token(&self, token: &Token) -> Result<Option<Record>> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE token = ? ORDER BY id LIMIT 1"
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_record).transpose()
    }

    async fn find_by_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<MySql>::new(SELECT_COLUMNS);
        query.push(" WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        decode_all(&rows)
    }

    async fn find_by_tokens(&self, tokens: &[Token]) -> Result<Vec<Record>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<MySql>::new(SELECT_COLUMNS);
        query.push(" WHERE token IN (");
        let mut separated = query.separated(", ");
        for token in tokens {
            separated.push_bind(token.as_str().to_string());
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        decode_all(&rows)
    }

    async fn scan(&self, scan: Scan) -> Result<Vec<RecordId>> {
        let sql = match scan {
            Scan::All => "SELECT id FROM records ORDER BY id",
            Scan::MissingToken => {
                "SELECT id FROM records WHERE token IS NULL OR token = '' ORDER BY id"
            }
        };

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(map_sqlx_error)?;
                RecordId::parse(&id).map_err(|e| {
                    StorageError::InvalidData(format!("invalid record id '{}': {e}", id))
                })
            })
            .collect()
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn create(&self, record: &Record) -> Result<()> {
        let attributes = serde_json::to_string(&record.attributes)
            .map_err(|e| StorageError::InvalidData(format!("unencodable attributes: {e}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO records (id, kind, token, attributes)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.id().to_string())
        .bind(record.kind())
        .bind(record.token().map(Token::as_str))
        .bind(attributes)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(conflict_from(&err, &record.id(), record.token()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn update_token(&self, id: &RecordId, token: Option<&Token>) -> Result<()> {
        let result = sqlx::query("UPDATE records SET token = ? WHERE id = ?")
            .bind(token.map(Token::as_str))
            .bind(id.to_string())
            .execute(&self.pool)
            .await;

        let done = match result {
            Ok(done) => done,
            Err(err) if is_unique_violation(&err) => return Err(conflict_from(&err, id, token)),
            Err(err) => return Err(map_sqlx_error(err)),
        };

        // MySQL reports zero affected rows for an unchanged value as well.
        if done.rows_affected() == 0 && !self.exists(id).await? {
            return Err(StorageError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn update_token_if_unset(&self, id: &RecordId, token: &Token) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE records SET token = ?
            WHERE id = ? AND (token IS NULL OR token = '')
            "#,
        )
        .bind(token.as_str())
        .bind(id.to_string())
        .execute(&self.pool)
        .await;

        let done = match result {
            Ok(done) => done,
            Err(err) if is_unique_violation(&err) => {
                return Err(conflict_from(&err, id, Some(token)));
            }
            Err(err) => return Err(map_sqlx_error(err)),
        };

        if done.rows_affected() == 1 {
            return Ok(true);
        }
        if !self.exists(id).await? {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(false)
    }
}
