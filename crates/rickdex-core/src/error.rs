use rickdex_schema::CharacterId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CharacterError {
    #[error("character {id} not found")]
    NotFound { id: CharacterId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// At least one episode of the batch could not be fetched; `url` is the
    /// first failing reference in input order.
    #[error("{failed} of {total} episodes unavailable, first: {url}: {reason}")]
    EpisodeUnavailable {
        url: String,
        reason: String,
        failed: usize,
        total: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("invalid character id: {input:?}")]
    InvalidIdentifier { input: String },
}

/// Parse free text from the search box into an identifier.
pub fn parse_identifier(input: &str) -> Result<CharacterId, InputError> {
    input
        .parse::<CharacterId>()
        .map_err(|_| InputError::InvalidIdentifier {
            input: input.to_string(),
        })
}
