use crate::error::{CoreError, Result};
use crate::settings::TokenSettings;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;

/// A secondary identifier that satisfies the token length convention.
///
/// Tokens are at least `min_token_length` characters long and never exactly
/// `id_length` characters, so a lookup value is never ambiguous between the
/// two identifier spaces.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(SmolStr);

impl Token {
    /// Creates a new `Token` after validating the input against `settings`.
    pub fn parse(value: impl AsRef<str>, settings: &TokenSettings) -> Result<Self> {
        let value = value.as_ref();
        Self::validate(value, settings)?;
        Ok(Self(SmolStr::new(value)))
    }

    /// Creates a `Token` without validation.
    ///
    /// Use this only for values read back from a store, which were validated
    /// when they were written.
    pub fn new_unchecked(value: impl AsRef<str>) -> Self {
        Self(SmolStr::new(value.as_ref()))
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the length in characters, the unit the length convention uses.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate(value: &str, settings: &TokenSettings) -> Result<()> {
        let len = value.chars().count();

        if len < settings.min_token_length {
            return Err(CoreError::InvalidToken(format!(
                "length must be at least {}, got {}",
                settings.min_token_length, len
            )));
        }

        if len == settings.id_length {
            return Err(CoreError::InvalidToken(format!(
                "length {} is reserved for record ids",
                settings.id_length
            )));
        }

        if value.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidToken(format!(
                "must not contain whitespace: '{}'",
                value
            )));
        }

        Ok(())
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TokenSettings {
        TokenSettings::default()
    }

    #[test]
    fn valid_tokens() {
        assert!(Token::parse("abcdef", &settings()).is_ok());
        assert!(Token::parse("a".repeat(23), &settings()).is_ok());
        assert!(Token::parse("a".repeat(25), &settings()).is_ok());
        assert!(Token::parse("longenoughtoken-7", &settings()).is_ok());
    }

    #[test]
    fn too_short() {
        assert!(Token::parse("", &settings()).is_err());
        assert!(Token::parse("tree", &settings()).is_err());
        assert!(Token::parse("abcde", &settings()).is_err());
    }

    #[test]
    fn id_length_is_reserved() {
        let err = Token::parse("a".repeat(24), &settings()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidToken(_)));
    }

    #[test]
    fn custom_settings() {
        let settings = TokenSettings::builder()
            .min_token_length(3)
            .id_length(10)
            .build();
        assert!(Token::parse("abc", &settings).is_ok());
        assert!(Token::parse("a".repeat(10), &settings).is_err());
    }

    #[test]
    fn whitespace_is_rejected() {
        assert!(Token::parse("abc def", &settings()).is_err());
    }

    #[test]
    fn display() {
        let token = Token::parse("goose-token", &settings()).unwrap();
        assert_eq!(token.to_string(), "goose-token");
        assert_eq!(token.len(), 11);
    }

    #[test]
    fn length_counts_characters() {
        let token = Token::parse("ééééé-x", &settings()).unwrap();
        assert_eq!(token.len(), 7);
        assert!(settings().permits_length(token.len()));
    }
}
