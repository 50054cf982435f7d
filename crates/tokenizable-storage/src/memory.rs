use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokenizable_core::store::{Result, ID_FIELD, TOKEN_FIELD};
use tokenizable_core::{ReadStore, Record, RecordId, Scan, StorageError, Store, Token};

/// In-memory implementation of the store contract using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking.
///
/// Token uniqueness is enforced by a separate `token -> id` index claimed
/// through the entry API, so of two concurrent writers racing for the same
/// token exactly one wins. The index can be dropped and rebuilt to model a
/// store whose unique index is missing or not yet built.
#[derive(Debug)]
pub struct InMemoryStore {
    records: DashMap<RecordId, Record>,
    tokens: DashMap<Token, RecordId>,
    unique_index: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new in-memory store with the unique token index in place.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new in-memory store with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
            tokens: DashMap::with_capacity(capacity),
            unique_index: AtomicBool::new(true),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_unique_index(&self) -> bool {
        self.unique_index.load(Ordering::SeqCst)
    }

    /// Drops the unique token index. Later writes accept duplicate tokens.
    pub fn drop_unique_index(&self) {
        self.unique_index.store(false, Ordering::SeqCst);
        self.tokens.clear();
    }

    /// Builds the unique token index from the stored records.
    ///
    /// Fails with `Conflict` and leaves the index dropped if two records
    /// already share a token.
    pub fn create_unique_index(&self) -> Result<()> {
        self.tokens.clear();

        let mut held: Vec<(Token, RecordId)> = self
            .records
            .iter()
            .filter_map(|entry| entry.token().map(|t| (t.clone(), entry.id())))
            .collect();
        held.sort_by(|a, b| a.1.cmp(&b.1));

        for (token, id) in held {
            match self.tokens.entry(token) {
                Entry::Occupied(existing) => {
                    let value = existing.key().to_string();
                    drop(existing);
                    self.tokens.clear();
                    return Err(StorageError::conflict(TOKEN_FIELD, value));
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }

        self.unique_index.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Claims `token` for `id` in the unique index.
    fn claim(&self, token: &Token, id: RecordId) -> Result<()> {
        if !self.has_unique_index() {
            return Ok(());
        }

        match self.tokens.entry(token.clone()) {
            Entry::Occupied(holder) if *holder.get() != id => {
                Err(StorageError::conflict(TOKEN_FIELD, token.as_str()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    fn release(&self, token: &Token, id: RecordId) {
        if self.has_unique_index() {
            self.tokens.remove_if(token, |_, holder| *holder == id);
        }
    }

    fn sorted(mut records: Vec<Record>) -> Vec<Record> {
        records.sort_by_key(Record::id);
        records.dedup_by_key(|r| r.id());
        records
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadStore for InMemoryStore {
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Record>> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }

    async fn find_by_token(&self, token: &Token) -> Result<Option<Record>> {
        if self.has_unique_index() {
            let Some(id) = self.tokens.get(token).map(|holder| *holder) else {
                return Ok(None);
            };
            return Ok(self.records.get(&id).map(|entry| entry.clone()));
        }

        // Without the index, several records may share the token.
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.token() == Some(token))
            .map(|entry| entry.clone())
            .min_by_key(Record::id))
    }

    async fn find_by_ids(&self, ids: &[RecordId]) -> Result<Vec<Record>> {
        let found = ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|entry| entry.clone()))
            .collect();
        Ok(Self::sorted(found))
    }

    async fn find_by_tokens(&self, tokens: &[Token]) -> Result<Vec<Record>> {
        let wanted: HashSet<&Token> = tokens.iter().collect();
        let found = self
            .records
            .iter()
            .filter(|entry| entry.token().is_some_and(|t| wanted.contains(t)))
            .map(|entry| entry.clone())
            .collect();
        Ok(Self::sorted(found))
    }

    async fn scan(&self, scan: Scan) -> Result<Vec<RecordId>> {
        let mut ids: Vec<RecordId> = self
            .records
            .iter()
            .filter(|entry| match scan {
                Scan::All => true,
                Scan::MissingToken => !entry.has_token(),
            })
            .map(|entry| entry.id())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create(&self, record: &Record) -> Result<()> {
        let id = record.id();

        match self.records.entry(id) {
            Entry::Occupied(_) => Err(StorageError::conflict(ID_FIELD, id.to_string())),
            Entry::Vacant(slot) => {
                if let Some(token) = record.token() {
                    self.claim(token, id)?;
                }
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update_token(&self, id: &RecordId, token: Option<&Token>) -> Result<()> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if let Some(token) = token {
            self.claim(token, *id)?;
        }
        if let Some(previous) = entry.token().filter(|previous| Some(*previous) != token) {
            self.release(previous, *id);
        }

        let updated = Record::from_parts(
            *id,
            entry.kind(),
            token.cloned(),
            entry.attributes.clone(),
        );
        *entry = updated;
        Ok(())
    }

    async fn update_token_if_unset(&self, id: &RecordId, token: &Token) -> Result<bool> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if entry.has_token() {
            return Ok(false);
        }
        self.claim(token, *id)?;

        let updated = Record::from_parts(
            *id,
            entry.kind(),
            Some(token.clone()),
            entry.attributes.clone(),
        );
        *entry = updated;
        Ok(true)
    }
}
