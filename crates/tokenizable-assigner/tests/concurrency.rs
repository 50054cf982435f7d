use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokenizable_assigner::{
    Record, RecordId, SeqGenerator, Token, TokenAssigner, TokenGenerator, TokenSettings,
    TokenizerError,
};
use tokenizable_core::store::Result as StoreResult;
use tokenizable_core::{ReadStore, Scan, Store};
use tokenizable_storage::InMemoryStore;

const WRITERS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_with_colliding_candidates_all_succeed() {
    // Every writer starts from the same first candidate.
    let generator =
        TokenGenerator::new(SeqGenerator::with_prefix("race"), TokenSettings::default());
    let assigner = Arc::new(TokenAssigner::new(InMemoryStore::new(), generator).unwrap());
    let mut handles = Vec::with_capacity(WRITERS);

    for i in 0..WRITERS {
        let assigner = Arc::clone(&assigner);
        handles.push(tokio::spawn(async move {
            let record = Record::new("dummy").with_attribute("writer", i.to_string());
            assigner.assign_on_create(record).await
        }));
    }

    let mut tokens = HashSet::new();
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        assert!(tokens.insert(record.token().cloned().unwrap()));
    }

    assert_eq!(tokens.len(), WRITERS);
    assert_eq!(assigner.store().len(), WRITERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_seeding_converges_on_unique_tokens() {
    let generator =
        TokenGenerator::new(SeqGenerator::with_prefix("seed"), TokenSettings::default());
    let assigner = Arc::new(TokenAssigner::new(InMemoryStore::new(), generator).unwrap());
    for _ in 0..WRITERS {
        assigner.assign_on_create(Record::new("dummy")).await.unwrap();
    }
    assigner.clear_tokens().await.unwrap();

    // Two maintenance runs overlapping on the same collection.
    let first = tokio::spawn({
        let assigner = Arc::clone(&assigner);
        async move { assigner.seed_tokens().await }
    });
    let second = tokio::spawn({
        let assigner = Arc::clone(&assigner);
        async move { assigner.seed_tokens().await }
    });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let ids = assigner.store().scan(Scan::All).await.unwrap();
    let records = assigner.store().find_by_ids(&ids).await.unwrap();
    let tokens: HashSet<_> = records.iter().filter_map(Record::token).collect();
    assert_eq!(records.len(), WRITERS);
    assert_eq!(tokens.len(), WRITERS);
    assert!(assigner.store().scan(Scan::MissingToken).await.unwrap().is_empty());
}

/// Lets another writer set a token on one record in the gap between the
/// assigner reading that record and writing to it.
#[derive(Debug)]
struct InterleavedStore {
    inner: InMemoryStore,
    pending: Mutex<Option<RecordId>>,
    other: Token,
}

impl InterleavedStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            pending: Mutex::new(None),
            other: Token::new_unchecked("other-writer"),
        }
    }

    fn interleave_on(&self, id: RecordId) {
        *self.pending.lock().unwrap() = Some(id);
    }
}

#[async_trait]
impl ReadStore for InterleavedStore {
    async fn find_by_id(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_token(&self, token: &Token) -> StoreResult<Option<Record>> {
        self.inner.find_by_token(token).await
    }

    async fn find_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>> {
        self.inner.find_by_ids(ids).await
    }

    // The assigner checks token holders right before each write.
    async fn find_by_tokens(&self, tokens: &[Token]) -> StoreResult<Vec<Record>> {
        let pending = self.pending.lock().unwrap().take();
        if let Some(id) = pending {
            self.inner.update_token_if_unset(&id, &self.other).await?;
        }
        self.inner.find_by_tokens(tokens).await
    }

    async fn scan(&self, scan: Scan) -> StoreResult<Vec<RecordId>> {
        self.inner.scan(scan).await
    }
}

#[async_trait]
impl Store for InterleavedStore {
    async fn create(&self, record: &Record) -> StoreResult<()> {
        self.inner.create(record).await
    }

    async fn update_token(&self, id: &RecordId, token: Option<&Token>) -> StoreResult<()> {
        self.inner.update_token(id, token).await
    }

    async fn update_token_if_unset(&self, id: &RecordId, token: &Token) -> StoreResult<bool> {
        self.inner.update_token_if_unset(id, token).await
    }
}

fn interleaved_assigner() -> TokenAssigner<InterleavedStore, SeqGenerator> {
    let generator =
        TokenGenerator::new(SeqGenerator::with_prefix("wh"), TokenSettings::default());
    TokenAssigner::new(InterleavedStore::new(), generator).unwrap()
}

#[tokio::test]
async fn seeding_skips_a_record_tokened_by_another_writer() {
    let assigner = interleaved_assigner();
    let raced = Record::new("dummy");
    let untouched = Record::new("dummy");
    assigner.store().create(&raced).await.unwrap();
    assigner.store().create(&untouched).await.unwrap();
    assigner.store().interleave_on(raced.id());

    let seeded = assigner.seed_tokens().await.unwrap();

    assert_eq!(seeded, 1);
    let stored = assigner.store().find_by_id(&raced.id()).await.unwrap().unwrap();
    assert_eq!(stored.token().unwrap().as_str(), "other-writer");
    let stored = assigner.store().find_by_id(&untouched.id()).await.unwrap().unwrap();
    assert!(stored.has_token());
    assert_ne!(stored.token().unwrap().as_str(), "other-writer");
}

#[tokio::test]
async fn save_adopts_a_token_set_by_another_writer() {
    let assigner = interleaved_assigner();
    let mut record = Record::new("dummy");
    assigner.store().create(&record).await.unwrap();
    assigner.store().interleave_on(record.id());

    assigner.save(&mut record).await.unwrap();

    assert_eq!(record.token().unwrap().as_str(), "other-writer");
    let stored = assigner.store().find_by_id(&record.id()).await.unwrap().unwrap();
    assert_eq!(stored.token(), record.token());
}

#[tokio::test]
async fn save_rejects_a_preset_that_lost_the_race() {
    let assigner = interleaved_assigner();
    let mut record = Record::new("dummy");
    assigner.store().create(&record).await.unwrap();
    assigner.set_token(&mut record, "mine-token").unwrap();
    assigner.store().interleave_on(record.id());

    let err = assigner.save(&mut record).await.unwrap_err();

    assert!(matches!(err, TokenizerError::TokenAlreadySet(_)));
    let stored = assigner.store().find_by_id(&record.id()).await.unwrap().unwrap();
    assert_eq!(stored.token().unwrap().as_str(), "other-writer");
}
