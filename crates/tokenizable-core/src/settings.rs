use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 6;
pub const DEFAULT_ID_LENGTH: usize = 24;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 256;

/// Length conventions and retry bound for token assignment.
///
/// Missing fields fall back to their defaults when deserialized, so a host
/// can override a single option:
///
/// ```ignore
/// let settings: TokenSettings = serde_json::from_str(r#"{"min_token_length": 8}"#)?;
/// assert_eq!(settings.id_length, 24);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Minimum acceptable token length.
    #[builder(default = DEFAULT_MIN_TOKEN_LENGTH)]
    pub min_token_length: usize,
    /// The string length reserved for primary identifiers and disallowed for tokens.
    #[builder(default = DEFAULT_ID_LENGTH)]
    pub id_length: usize,
    /// Upper bound on generation attempts for a single record.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TokenSettings {
    pub fn validate(&self) -> Result<()> {
        if self.min_token_length == 0 {
            return Err(CoreError::InvalidSettings(
                "min_token_length must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidSettings(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if a token of `len` characters satisfies the length convention.
    pub fn permits_length(&self, len: usize) -> bool {
        len >= self.min_token_length && len != self.id_length
    }
}
