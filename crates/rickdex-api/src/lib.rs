pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use rickdex_schema::{Character, CharacterId, Episode};

pub use http::{HttpApi, DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Read access to the character and episode resources.
///
/// Any error means "not available": callers do not distinguish between a
/// 404, a transport failure and an undecodable body.
#[async_trait]
pub trait CharacterApi: Send + Sync {
    async fn character(&self, id: CharacterId) -> Result<Character>;

    /// Fetch an episode by the absolute URL a character lists for it.
    async fn episode(&self, url: &str) -> Result<Episode>;

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
