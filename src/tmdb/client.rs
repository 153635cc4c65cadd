use serde_json::Value;
use std::sync::Arc;

use super::fetch::{FetchError, ResilientFetcher, RetryPolicy, Transport};
use super::mood::MoodPreset;
use crate::config::TmdbConfig;

#[derive(Debug, thiserror::Error)]
pub enum TmdbError {
    #[error("TMDB API key missing")]
    MissingApiKey,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type TmdbResult<T> = Result<T, TmdbError>;

/// Client for the handful of TMDB v3 endpoints the server uses.
///
/// Lookups made on behalf of the browse pages go out once. Lookups made by
/// the chatbot go through the retrying fetcher.
pub struct TmdbClient {
    api_key: Option<String>,
    base_url: String,
    lookup: ResilientFetcher,
    resilient: ResilientFetcher,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig, transport: Arc<dyn Transport>) -> Self {
        let policy = config.retry_policy();
        Self {
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lookup: ResilientFetcher::new(transport.clone(), RetryPolicy::no_retry(policy.timeout)),
            resilient: ResilientFetcher::new(transport, policy),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build a fully formed URL with the API key as the first parameter.
    pub fn url(&self, path: &str, params: &[(&str, String)]) -> TmdbResult<String> {
        let api_key = self.api_key.as_deref().ok_or(TmdbError::MissingApiKey)?;

        let mut url = format!(
            "{}{}?api_key={}",
            self.base_url,
            path,
            urlencoding::encode(api_key)
        );
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        Ok(url)
    }

    async fn lookup(&self, path: &str, params: &[(&str, String)]) -> TmdbResult<Value> {
        let url = self.url(path, params)?;
        Ok(self.lookup.fetch_json(&url).await?)
    }

    async fn lookup_with_retry(&self, path: &str, params: &[(&str, String)]) -> TmdbResult<Value> {
        let url = self.url(path, params)?;
        Ok(self.resilient.fetch_json(&url).await?)
    }

    pub async fn popular(&self) -> TmdbResult<Value> {
        self.lookup("/movie/popular", &[]).await
    }

    pub async fn trending_week(&self) -> TmdbResult<Value> {
        self.lookup("/trending/movie/week", &[]).await
    }

    pub async fn search(&self, query: &str) -> TmdbResult<Value> {
        self.lookup("/search/movie", &[("query", query.to_string())])
            .await
    }

    pub async fn movie(&self, id: u64) -> TmdbResult<Value> {
        self.lookup(&format!("/movie/{}", id), &[]).await
    }

    pub async fn videos(&self, id: u64) -> TmdbResult<Value> {
        self.lookup(&format!("/movie/{}/videos", id), &[]).await
    }

    pub async fn watch_providers(&self, id: u64) -> TmdbResult<Value> {
        self.lookup(&format!("/movie/{}/watch/providers", id), &[])
            .await
    }

    pub async fn recommendations(&self, id: u64) -> TmdbResult<Value> {
        self.lookup(&format!("/movie/{}/recommendations", id), &[])
            .await
    }

    pub async fn discover_mood(&self, mood: &MoodPreset) -> TmdbResult<Value> {
        self.lookup("/discover/movie", &mood.discover_params()).await
    }

    /// Popular movies in a genre and/or release year, with retries.
    pub async fn discover_by_genre_year(
        &self,
        genre_id: Option<u32>,
        year: Option<u32>,
    ) -> TmdbResult<Value> {
        let mut params = vec![("sort_by", "popularity.desc".to_string())];
        if let Some(genre_id) = genre_id {
            params.push(("with_genres", genre_id.to_string()));
        }
        if let Some(year) = year {
            params.push(("primary_release_year", year.to_string()));
        }
        self.lookup_with_retry("/discover/movie", &params).await
    }

    /// Free-text search, with retries.
    pub async fn search_with_retry(&self, query: &str) -> TmdbResult<Value> {
        self.lookup_with_retry("/search/movie", &[("query", query.to_string())])
            .await
    }
}
