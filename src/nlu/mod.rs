//! Natural-language understanding: turn free text into a named intent.

mod dialogflow;

pub use dialogflow::DialogflowClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub intent: Option<String>,
    pub fulfillment_text: Option<String>,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("NLU client not configured: {0}")]
    NotConfigured(&'static str),
    #[error("NLU request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("NLU service returned {0}: {1}")]
    Status(u16, String),
}

pub type NluResult<T> = Result<T, NluError>;

#[async_trait]
pub trait IntentDetector: Send + Sync {
    async fn detect(&self, session: &str, text: &str, language: &str) -> NluResult<QueryResult>;
}
