pub mod obfuscated;
pub mod seq;

pub use obfuscated::{ObfuscatedGenerator, Obfuscator};
pub use seq::SeqGenerator;

use tokenizable_core::{RecordId, Token, TokenSettings};

/// Strategy for producing raw token candidates.
///
/// Implementations are pure generators that don't interact with storage.
/// For a given `discriminator`, different `offset`s must yield different
/// strings with very high probability so that a retry after a uniqueness
/// conflict makes progress. The output does not have to satisfy the length
/// convention; [`TokenGenerator`] conforms it.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self, discriminator: &RecordId, offset: u64) -> String;
}

impl<F> Generator for F
where
    F: Fn(&RecordId, u64) -> String + Send + Sync + 'static,
{
    fn generate(&self, discriminator: &RecordId, offset: u64) -> String {
        self(discriminator, offset)
    }
}

/// Wraps a [`Generator`] strategy and conforms its output to [`TokenSettings`].
#[derive(Debug, Clone)]
pub struct TokenGenerator<G> {
    strategy: G,
    settings: TokenSettings,
}

impl<G: Generator> TokenGenerator<G> {
    pub fn new(strategy: G, settings: TokenSettings) -> Self {
        Self { strategy, settings }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Produces the candidate token for attempt `offset`.
    ///
    /// Never fails: the raw candidate is always conformed into a valid token.
    pub fn generate(&self, discriminator: &RecordId, offset: u64) -> Token {
        let raw = self.strategy.generate(discriminator, offset);
        Token::new_unchecked(conform(&raw, &self.settings))
    }
}

impl TokenGenerator<ObfuscatedGenerator> {
    /// Uses the default [`ObfuscatedGenerator`] strategy.
    pub fn with_settings(settings: TokenSettings) -> Self {
        Self::new(ObfuscatedGenerator::default(), settings)
    }
}

impl Default for TokenGenerator<ObfuscatedGenerator> {
    fn default() -> Self {
        Self::with_settings(TokenSettings::default())
    }
}

const PAD: char = '0';

/// Deterministically reshapes `candidate` so that it satisfies `settings`.
///
/// Whitespace becomes `_`, short candidates are right-padded with `0` up to
/// the minimum length, and a candidate of exactly the reserved id length
/// loses its last character (or gains one more `0` when trimming would drop
/// it below the minimum).
pub fn conform(candidate: &str, settings: &TokenSettings) -> String {
    let mut token: String = candidate
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    let mut len = token.chars().count();

    while len < settings.min_token_length {
        token.push(PAD);
        len += 1;
    }

    if len == settings.id_length {
        if len > settings.min_token_length {
            token.pop();
        } else {
            token.push(PAD);
        }
    }

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> RecordId {
        RecordId::generate()
    }

    #[test]
    fn pads_short_candidates() {
        let settings = TokenSettings::default();
        assert_eq!(conform("3", &settings), "300000");
        assert_eq!(conform("", &settings), "000000");
    }

    #[test]
    fn keeps_valid_candidates() {
        let settings = TokenSettings::default();
        assert_eq!(conform("abcdef", &settings), "abcdef");
        assert_eq!(conform(&"a".repeat(30), &settings), "a".repeat(30));
    }

    #[test]
    fn trims_id_length_candidates() {
        let settings = TokenSettings::default();
        assert_eq!(conform(&"a".repeat(24), &settings), "a".repeat(23));
    }

    #[test]
    fn extends_when_trimming_would_be_too_short() {
        let settings = TokenSettings::builder()
            .min_token_length(8)
            .id_length(8)
            .build();
        assert_eq!(conform("abc", &settings), "abc000000");
        assert_eq!(conform("abcdefgh", &settings), "abcdefgh0");
    }

    #[test]
    fn replaces_whitespace() {
        let settings = TokenSettings::default();
        assert_eq!(conform("ab cd ef", &settings), "ab_cd_ef");
    }

    #[test]
    fn token_generator_output_satisfies_settings() {
        let settings = TokenSettings::default();
        let generator = TokenGenerator::new(|_: &RecordId, _: u64| "3".to_string(), settings);

        let token = generator.generate(&id(), 0);

        assert_eq!(token.as_str(), "300000");
        assert!(Token::parse(token.as_str(), &settings).is_ok());
    }

    #[test]
    fn token_generator_never_yields_id_length() {
        let settings = TokenSettings::default();
        // A strategy that would hand back a record id as its token.
        let generator = TokenGenerator::new(
            |discriminator: &RecordId, _: u64| discriminator.to_string(),
            settings,
        );

        let token = generator.generate(&id(), 0);

        assert_ne!(token.len(), 24);
        assert!(settings.permits_length(token.len()));
    }

    #[test]
    fn default_generator_is_valid_across_offsets() {
        let generator = TokenGenerator::default();
        let discriminator = id();

        for offset in 0..500 {
            let token = generator.generate(&discriminator, offset);
            assert!(generator.settings().permits_length(token.len()));
        }
    }
}
