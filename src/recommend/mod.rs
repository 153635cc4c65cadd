//! Movie-to-movie recommendations.

mod script;

pub use script::ScriptRecommender;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("Failed to start recommender: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Recommender produced no usable output: {0}")]
    SubprocessOutput(String),
}

/// Anything that can suggest movies similar to a given movie id.
#[async_trait]
pub trait RecommendationProvider: Send + Sync {
    async fn recommend(&self, movie_id: &str) -> Result<Value, RecommendError>;
}
