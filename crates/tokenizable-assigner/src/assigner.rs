use crate::error::{Result, TokenizerError};
use std::sync::Arc;
use tokenizable_core::store::TOKEN_FIELD;
use tokenizable_core::{Lookup, Record, RecordId, Scan, StorageError, Store, Token, TokenSettings};
use tokenizable_generator::{Generator, TokenGenerator};
use tracing::{debug, error, info, warn};

/// How a record reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    /// Insert a new record.
    Create,
    /// Set the token of a stored record that has none; never overwrites.
    Fill,
    /// Swap out a stored token that another record also holds.
    Replace,
}

/// Binds unique tokens to records.
///
/// This service wraps a [`Store`] and a [`TokenGenerator`] to handle:
/// - token assignment on record creation, with retry on uniqueness conflicts
/// - the save-time duplicate check for writes that skipped assignment
/// - bulk seeding and clearing of tokens
/// - lookups by either record id or token
///
/// The store's unique index is the source of truth for conflicts. The
/// assigner holds no locks: when two writers race for one candidate, the
/// store rejects the second write and its writer moves on to the next offset.
#[derive(Debug)]
pub struct TokenAssigner<S, G> {
    store: Arc<S>,
    generator: Arc<TokenGenerator<G>>,
}

impl<S, G> Clone for TokenAssigner<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<S: Store, G: Generator> TokenAssigner<S, G> {
    /// Creates a new `TokenAssigner` over `store`.
    ///
    /// Fails with `InvalidSettings` if the generator's settings are unusable.
    pub fn new(store: S, generator: TokenGenerator<G>) -> Result<Self> {
        Self::with_shared_store(Arc::new(store), generator)
    }

    /// Creates a new `TokenAssigner` over a store shared with other components.
    pub fn with_shared_store(store: Arc<S>, generator: TokenGenerator<G>) -> Result<Self> {
        generator.settings().validate()?;
        Ok(Self {
            store,
            generator: Arc::new(generator),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &TokenSettings {
        self.generator.settings()
    }

    /// Sets the token of `record` directly.
    ///
    /// Fails with `TokenAlreadySet` if the record already has a token, whatever
    /// `value` is, and with `InvalidToken` if `value` breaks the length
    /// convention. Invalid values are never corrected here.
    pub fn set_token(&self, record: &mut Record, value: impl AsRef<str>) -> Result<()> {
        if let Some(existing) = record.token().filter(|t| !t.is_empty()) {
            return Err(TokenizerError::TokenAlreadySet(format!(
                "record {} already has token '{}'",
                record.id(),
                existing
            )));
        }

        let token = Token::parse(value, self.settings())?;
        record.set_token(token)?;
        Ok(())
    }

    /// Assigns a token to a new record and creates it in the store.
    ///
    /// A token the host set beforehand is kept if it is unique and replaced
    /// if it is not. Returns the persisted record.
    pub async fn assign_on_create(&self, mut record: Record) -> Result<Record> {
        self.persist(&mut record, Write::Create).await?;
        Ok(record)
    }

    /// Saves the token of `record`, creating the record if the store does not
    /// know its id.
    ///
    /// This is the final-save check for callers that bypass
    /// [`assign_on_create`](Self::assign_on_create): a missing token is
    /// generated, and a token already held by another record is replaced,
    /// before the write is allowed to succeed.
    ///
    /// For a record the store already knows, only the token is written; `kind`
    /// and `attributes` are the host's to persist. A token already stored for
    /// the record is never changed: a copy without a token adopts it, and a
    /// copy carrying a different token fails with `TokenAlreadySet`.
    pub async fn save(&self, record: &mut Record) -> Result<()> {
        let Some(stored) = self.store.find_by_id(&record.id()).await? else {
            self.persist(record, Write::Create).await?;
            return Ok(());
        };

        let Some(stored_token) = stored.token().filter(|t| !t.is_empty()) else {
            if !self.persist(record, Write::Fill).await? {
                self.adopt_stored(record).await?;
            }
            return Ok(());
        };

        adopt(record, stored_token)?;
        if self.held_elsewhere(record.id(), stored_token).await? {
            warn!(
                record_id = %record.id(),
                token = %stored_token,
                "token also held by another record, reassigning"
            );
            record.reset_token();
            self.persist(record, Write::Replace).await?;
        } else {
            debug!(record_id = %record.id(), "token unchanged, nothing to save");
        }
        Ok(())
    }

    /// Assigns tokens to every record that has none.
    ///
    /// Records that already carry a token are never touched, including ones
    /// that gained a token from another writer after the scan. Returns the
    /// number of records seeded. Each record is written on its own, so an
    /// interrupted run can simply be repeated.
    pub async fn seed_tokens(&self) -> Result<usize> {
        let ids = self.store.scan(Scan::MissingToken).await?;
        let mut seeded = 0;

        for id in ids {
            let Some(mut record) = self.store.find_by_id(&id).await? else {
                debug!(record_id = %id, "record vanished before seeding");
                continue;
            };
            if record.has_token() {
                continue;
            }

            match self.persist(&mut record, Write::Fill).await {
                Ok(true) => seeded += 1,
                Ok(false) => {
                    debug!(record_id = %id, "token set by another writer, skipping");
                }
                Err(TokenizerError::Storage(StorageError::NotFound(_))) => {
                    debug!(record_id = %id, "record vanished before seeding");
                }
                Err(err) => return Err(err),
            }
        }

        info!(seeded, "seeded missing tokens");
        Ok(seeded)
    }

    /// Removes the token from every record, leaving the records otherwise intact.
    ///
    /// Returns the number of records cleared.
    pub async fn clear_tokens(&self) -> Result<usize> {
        let ids = self.store.scan(Scan::All).await?;
        let mut cleared = 0;

        for id in ids {
            match self.store.update_token(&id, None).await {
                Ok(()) => cleared += 1,
                Err(StorageError::NotFound(_)) => {
                    debug!(record_id = %id, "record vanished before clearing");
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(cleared, "cleared tokens");
        Ok(cleared)
    }

    /// Finds records by id or token.
    ///
    /// A single identifier is tried as a record id first, then as a token.
    /// Several identifiers are resolved the same way, one by one, and the
    /// matches come back sorted by record id without duplicates.
    /// Identifiers that are neither a valid id nor a valid token match nothing.
    pub async fn find(&self, lookup: impl Into<Lookup>) -> Result<Vec<Record>> {
        match lookup.into() {
            Lookup::One(value) => Ok(self.find_one(&value).await?.into_iter().collect()),
            Lookup::Many(values) => self.find_many(&values).await,
        }
    }

    /// Finds one record by id or token.
    pub async fn find_one(&self, identifier: &str) -> Result<Option<Record>> {
        if let Ok(id) = RecordId::parse(identifier) {
            if let Some(record) = self.store.find_by_id(&id).await? {
                return Ok(Some(record));
            }
        }

        match Token::parse(identifier, self.settings()) {
            Ok(token) => Ok(self.store.find_by_token(&token).await?),
            Err(_) => Ok(None),
        }
    }

    async fn find_many(&self, identifiers: &[String]) -> Result<Vec<Record>> {
        let mut ids = Vec::new();
        let mut tokens = Vec::new();

        for identifier in identifiers {
            match RecordId::parse(identifier) {
                Ok(id) => ids.push(id),
                Err(_) => {
                    if let Ok(token) = Token::parse(identifier, self.settings()) {
                        tokens.push(token);
                    }
                }
            }
        }

        let mut found = self.store.find_by_ids(&ids).await?;
        found.extend(self.store.find_by_tokens(&tokens).await?);
        found.sort_by_key(Record::id);
        found.dedup_by_key(|record| record.id());
        Ok(found)
    }

    /// Writes `record`, regenerating its token until the store accepts it.
    ///
    /// Returns `false` if a `Fill` found the stored record already holding a
    /// token; nothing is written then.
    async fn persist(&self, record: &mut Record, write: Write) -> Result<bool> {
        let max_attempts = self.settings().max_attempts;
        let mut offset: u64 = 0;

        for attempt in 1..=max_attempts {
            let current = record.token().filter(|t| !t.is_empty()).cloned();
            let (token, generated) = match current {
                Some(token) => (token, false),
                None => {
                    let token = self.generator.generate(&record.id(), offset);
                    record.reset_token();
                    record.set_token(token.clone())?;
                    (token, true)
                }
            };

            debug!(
                record_id = %record.id(),
                token = %token,
                offset,
                attempt,
                "writing token"
            );

            match self.write_checked(record, &token, write).await {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    if generated {
                        record.reset_token();
                    }
                    debug!(record_id = %record.id(), "record already holds a token");
                    return Ok(false);
                }
                Err(err) if err.is_conflict_on(TOKEN_FIELD) => {
                    warn!(
                        record_id = %record.id(),
                        token = %token,
                        offset,
                        "token already taken, regenerating"
                    );
                    record.reset_token();
                    if generated {
                        offset += 1;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        record.reset_token();
        error!(
            record_id = %record.id(),
            attempts = max_attempts,
            "token assignment exhausted"
        );
        Err(TokenizerError::AssignmentExhausted {
            record_id: record.id(),
            attempts: max_attempts,
        })
    }

    /// Rejects `token` if another record already holds it, then writes.
    ///
    /// The lookup covers stores whose unique index is missing or lagging; the
    /// write itself still relies on the index to settle concurrent races.
    async fn write_checked(
        &self,
        record: &Record,
        token: &Token,
        write: Write,
    ) -> std::result::Result<bool, StorageError> {
        if self.held_elsewhere(record.id(), token).await? {
            return Err(StorageError::conflict(TOKEN_FIELD, token.as_str()));
        }

        match write {
            Write::Create => self.store.create(record).await.map(|()| true),
            Write::Fill => self.store.update_token_if_unset(&record.id(), token).await,
            Write::Replace => self
                .store
                .update_token(&record.id(), Some(token))
                .await
                .map(|()| true),
        }
    }

    /// Whether any record other than `id` holds `token`.
    ///
    /// Looks at every holder, so a duplicate left behind by a missing index
    /// is seen even when `id` sorts first.
    async fn held_elsewhere(
        &self,
        id: RecordId,
        token: &Token,
    ) -> std::result::Result<bool, StorageError> {
        let holders = self.store.find_by_tokens(std::slice::from_ref(token)).await?;
        Ok(holders.iter().any(|holder| holder.id() != id))
    }

    /// Takes over the token another writer stored for `record`.
    async fn adopt_stored(&self, record: &mut Record) -> Result<()> {
        let stored = self
            .store
            .find_by_id(&record.id())
            .await?
            .ok_or_else(|| StorageError::NotFound(record.id().to_string()))?;

        match stored.token().filter(|t| !t.is_empty()) {
            Some(token) => adopt(record, token),
            None => Ok(()),
        }
    }
}

/// Aligns `record` with the token the store holds for it.
fn adopt(record: &mut Record, stored: &Token) -> Result<()> {
    match record.token().filter(|t| !t.is_empty()) {
        Some(current) if current == stored => Ok(()),
        Some(current) => Err(TokenizerError::TokenAlreadySet(format!(
            "record {} is stored with token '{}', not '{}'",
            record.id(),
            stored,
            current
        ))),
        None => {
            record.set_token(stored.clone())?;
            Ok(())
        }
    }
}
