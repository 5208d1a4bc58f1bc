use std::sync::Arc;

use rickdex_api::CharacterApi;
use rickdex_schema::EpisodeSummary;

use crate::error::ResolutionError;

#[derive(Clone)]
pub struct EpisodeResolver {
    api: Arc<dyn CharacterApi>,
}

impl EpisodeResolver {
    pub fn new(api: Arc<dyn CharacterApi>) -> Self {
        Self { api }
    }

    /// Fetch every referenced episode concurrently and wait for all of them.
    ///
    /// All-or-nothing: a single failed reference fails the batch. On success
    /// the summaries are in the same order as `refs`.
    pub async fn resolve(&self, refs: &[String]) -> Result<Vec<EpisodeSummary>, ResolutionError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let fetches = refs.iter().map(|url| {
            let api = self.api.clone();
            async move { api.episode(url).await }
        });
        let results = futures::future::join_all(fetches).await;

        let total = results.len();
        let mut summaries = Vec::with_capacity(total);
        let mut first_failure: Option<(String, String)> = None;
        let mut failed = 0;

        for (url, result) in refs.iter().zip(results) {
            match result {
                Ok(episode) => summaries.push(EpisodeSummary::from(episode)),
                Err(e) => {
                    failed += 1;
                    if first_failure.is_none() {
                        first_failure = Some((url.clone(), format!("{e:#}")));
                    }
                }
            }
        }

        if let Some((url, reason)) = first_failure {
            tracing::warn!(%url, %reason, failed, total, "episode resolution failed");
            return Err(ResolutionError::EpisodeUnavailable {
                url,
                reason,
                failed,
                total,
            });
        }

        tracing::debug!(count = summaries.len(), "episodes resolved");
        Ok(summaries)
    }
}
