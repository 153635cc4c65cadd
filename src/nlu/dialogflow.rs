use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{IntentDetector, NluError, NluResult, QueryResult};
use crate::config::DialogflowConfig;

/// Dialogflow ES `detectIntent` over REST.
pub struct DialogflowClient {
    client: reqwest::Client,
    endpoint: String,
    project_id: Option<String>,
    access_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
}

#[derive(Serialize)]
struct QueryInput<'a> {
    text: TextInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<WireQueryResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQueryResult {
    #[serde(default)]
    fulfillment_text: Option<String>,
    #[serde(default)]
    intent: Option<WireIntent>,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIntent {
    #[serde(default)]
    display_name: Option<String>,
}

impl From<WireQueryResult> for QueryResult {
    fn from(wire: WireQueryResult) -> Self {
        QueryResult {
            intent: wire
                .intent
                .and_then(|i| i.display_name)
                .filter(|n| !n.is_empty()),
            fulfillment_text: wire.fulfillment_text.filter(|t| !t.is_empty()),
            parameters: wire.parameters.unwrap_or_default(),
        }
    }
}

impl DialogflowClient {
    pub fn new(config: &DialogflowConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone().filter(|p| !p.is_empty()),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn session_url(&self, project_id: &str, session: &str) -> String {
        format!(
            "{}/projects/{}/agent/sessions/{}:detectIntent",
            self.endpoint,
            urlencoding::encode(project_id),
            urlencoding::encode(session)
        )
    }
}

#[async_trait]
impl IntentDetector for DialogflowClient {
    async fn detect(&self, session: &str, text: &str, language: &str) -> NluResult<QueryResult> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or(NluError::NotConfigured("project id"))?;
        let token = self
            .access_token
            .as_deref()
            .ok_or(NluError::NotConfigured("access token"))?;

        let url = self.session_url(project_id, session);
        debug!(session = %session, "Sending Dialogflow query");

        let body = DetectIntentRequest {
            query_input: QueryInput {
                text: TextInput {
                    text,
                    language_code: language,
                },
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NluError::Status(status.as_u16(), detail));
        }

        let parsed: DetectIntentResponse = response.json().await?;
        let result = parsed.query_result.map(QueryResult::from).unwrap_or_default();
        debug!(intent = ?result.intent, "Dialogflow answered");
        Ok(result)
    }
}
