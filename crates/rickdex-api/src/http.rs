use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use rickdex_schema::{Character, CharacterId, Episode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::CharacterApi;

pub const DEFAULT_API_BASE: &str = "https://rickandmortyapi.com/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str = concat!("rickdex/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    api_base: String,
}

impl HttpApi {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base)
    }

    pub fn with_client(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_settings(
        api_base: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("failed to build http client")?;
        Ok(Self::with_client(client, api_base))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn character_url(&self, id: CharacterId) -> String {
        format!("{}/character/{id}", self.api_base)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .with_context(|| format!("request failed: {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ApiError>(&text).ok();
            return Err(format_api_error(status, url, parsed));
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }
}

#[async_trait]
impl CharacterApi for HttpApi {
    async fn character(&self, id: CharacterId) -> Result<Character> {
        let url = self.character_url(id);
        tracing::debug!(%id, %url, "fetching character");
        self.get_json(&url).await
    }

    async fn episode(&self, url: &str) -> Result<Episode> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("unsupported episode reference: {url}");
        }
        tracing::debug!(%url, "fetching episode");
        self.get_json(url).await
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/", self.api_base);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request failed: {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format_api_error(status, &url, None));
        }
        Ok(())
    }
}

fn format_api_error(status: StatusCode, url: &str, parsed: Option<ApiError>) -> anyhow::Error {
    match parsed {
        Some(api_error) => anyhow!("api error ({status}) for {url}: {}", api_error.error),
        None => anyhow!("api error ({status}) for {url}"),
    }
}

/// Error body the API sends with 4xx answers, e.g. `{"error":"Character not found"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiError {
    pub error: String,
}
