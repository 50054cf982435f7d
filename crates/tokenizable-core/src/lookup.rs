use crate::record_id::RecordId;
use crate::token::Token;

/// An identifier (or several) that may be either a record id or a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for Lookup {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for Lookup {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<RecordId> for Lookup {
    fn from(value: RecordId) -> Self {
        Self::One(value.to_string())
    }
}

impl From<&RecordId> for Lookup {
    fn from(value: &RecordId) -> Self {
        Self::One(value.to_string())
    }
}

impl From<&Token> for Lookup {
    fn from(value: &Token) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<String>> for Lookup {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<&[&str]> for Lookup {
    fn from(values: &[&str]) -> Self {
        Self::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

impl From<Vec<RecordId>> for Lookup {
    fn from(values: Vec<RecordId>) -> Self {
        Self::Many(values.iter().map(RecordId::to_string).collect())
    }
}
