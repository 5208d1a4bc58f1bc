use std::sync::Arc;

use rickdex_api::CharacterApi;
use rickdex_schema::{Character, CharacterId};

use crate::error::CharacterError;

#[derive(Clone)]
pub struct CharacterLoader {
    api: Arc<dyn CharacterApi>,
}

impl CharacterLoader {
    pub fn new(api: Arc<dyn CharacterApi>) -> Self {
        Self { api }
    }

    /// Fetch one character. Every failure collapses into `NotFound`; the
    /// underlying cause is only logged.
    pub async fn load(&self, id: CharacterId) -> Result<Character, CharacterError> {
        tracing::info!(%id, "loading character");
        match self.api.character(id).await {
            Ok(character) => {
                tracing::debug!(
                    %id,
                    name = %character.name,
                    episodes = character.episode.len(),
                    "character loaded"
                );
                Ok(character)
            }
            Err(e) => {
                let detail = format!("{e:#}");
                tracing::warn!(%id, error = %detail, "character fetch failed");
                Err(CharacterError::NotFound { id })
            }
        }
    }
}
