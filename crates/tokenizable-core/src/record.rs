use crate::error::{CoreError, Result};
use crate::record_id::RecordId;
use crate::token::Token;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A persistable entity carrying an optional, write-once token.
///
/// Every record variant (`kind`) shares one token namespace: a token is
/// unique across the whole collection, not per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    kind: String,
    token: Option<Token>,
    /// Host-owned fields. Token assignment never reads or alters them.
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    /// Creates an unsaved record of the given kind with a fresh id and no token.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            kind: kind.into(),
            token: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Rebuilds a record from its stored parts.
    pub fn from_parts(
        id: RecordId,
        kind: impl Into<String>,
        token: Option<Token>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            kind: kind.into(),
            token,
            attributes,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn has_token(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Returns the creation second encoded in the record id.
    pub fn created_at(&self) -> Option<Timestamp> {
        self.id.timestamp()
    }

    /// Sets the token once.
    ///
    /// Returns `Err(TokenAlreadySet)` if the record already carries a token,
    /// regardless of the new value; the existing token is left untouched.
    pub fn set_token(&mut self, token: Token) -> Result<()> {
        if let Some(existing) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Err(CoreError::TokenAlreadySet(format!(
                "record {} already has token '{}'",
                self.id, existing
            )));
        }
        self.token = Some(token);
        Ok(())
    }

    /// Removes the token without going through the write-once guard.
    ///
    /// Reserved for the assignment retry loop, which discards candidates the
    /// store rejected. Host code clears tokens through the store.
    #[doc(hidden)]
    pub fn reset_token(&mut self) -> Option<Token> {
        self.token.take()
    }
}
