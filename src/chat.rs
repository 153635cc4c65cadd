//! Chatbot: classify a message, then answer it with movies from TMDB.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::nlu::{IntentDetector, NluError};
use crate::tmdb::{genre_id, summarize_results, MovieSummary, TmdbClient, TmdbError};

pub const INTENT_GENRE_YEAR: &str = "RecommendMovieByGenreYear";
pub const INTENT_MOOD: &str = "RecommendMovieByMood";

const REPLY_LIMIT: usize = 5;
const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_FOUND: &str = "Here's what I found:";
const NOTHING_FOR_CRITERIA: &str = "I couldn't find movies for that. Try different criteria?";
const NOTHING_FOR_KEYWORDS: &str = "I couldn't find any movies matching those keywords.";
const MOOD_WITHOUT_KEYWORDS: &str = "You asked for a mood, but didn't specify any keywords.";
const NOT_SURE: &str = "I'm not sure how to help with that.";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub dialogflow_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    pub movies: Vec<MovieSummary>,
    pub session_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("queryText is required")]
    MissingQuery,
    #[error("TMDB API key missing")]
    MissingApiKey,
    #[error(transparent)]
    Nlu(#[from] NluError),
    #[error(transparent)]
    Tmdb(#[from] TmdbError),
}

pub struct ChatService {
    tmdb: Arc<TmdbClient>,
    detector: Arc<dyn IntentDetector>,
    default_session: String,
}

impl ChatService {
    pub fn new(tmdb: Arc<TmdbClient>, detector: Arc<dyn IntentDetector>) -> Self {
        Self::with_session(tmdb, detector, uuid::Uuid::new_v4().to_string())
    }

    pub fn with_session(
        tmdb: Arc<TmdbClient>,
        detector: Arc<dyn IntentDetector>,
        default_session: String,
    ) -> Self {
        Self {
            tmdb,
            detector,
            default_session,
        }
    }

    pub fn default_session(&self) -> &str {
        &self.default_session
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let text = request
            .query_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ChatError::MissingQuery)?;

        if !self.tmdb.has_api_key() {
            return Err(ChatError::MissingApiKey);
        }

        let session = request
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.default_session.clone());
        let language = request
            .language_code
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        debug!(session = %session, "Chat query: {}", text);
        let result = self.detector.detect(&session, text, &language).await?;

        let Some(intent) = result.intent else {
            return Ok(ChatReply {
                dialogflow_response: result
                    .fulfillment_text
                    .unwrap_or_else(|| NOT_SURE.to_string()),
                intent: None,
                parameters: None,
                movies: Vec::new(),
                session_id: session,
            });
        };

        info!(intent = %intent, "Chat intent detected");
        let mut response = result
            .fulfillment_text
            .unwrap_or_else(|| DEFAULT_FOUND.to_string());
        let mut movies = Vec::new();

        match intent.as_str() {
            INTENT_GENRE_YEAR => {
                let genre = string_param(&result.parameters, "genre").and_then(|g| genre_id(&g));
                let year = result.parameters.get("year").and_then(parse_year);

                let page = self.tmdb.discover_by_genre_year(genre, year).await?;
                movies = summarize_results(&page, REPLY_LIMIT);

                if movies.is_empty() && response == DEFAULT_FOUND {
                    response = NOTHING_FOR_CRITERIA.to_string();
                }
            }
            INTENT_MOOD => match string_param(&result.parameters, "mood_keywords") {
                Some(keywords) => {
                    let page = self.tmdb.search_with_retry(&keywords).await?;
                    movies = summarize_results(&page, REPLY_LIMIT);
                    if movies.is_empty() {
                        response = NOTHING_FOR_KEYWORDS.to_string();
                    }
                }
                None => response = MOOD_WITHOUT_KEYWORDS.to_string(),
            },
            _ => {}
        }

        Ok(ChatReply {
            dialogflow_response: response,
            intent: Some(intent),
            parameters: Some(result.parameters),
            movies,
            session_id: session,
        })
    }
}

fn string_param(parameters: &Map<String, Value>, name: &str) -> Option<String> {
    parameters
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accept a year given as a number or as text with a leading integer, as
/// long as that integer has exactly four digits.
fn parse_year(value: &Value) -> Option<u32> {
    let year = match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64),
        Value::String(s) => {
            let digits: String = s
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<i64>().ok()
        }
        _ => None,
    }?;

    (1000..=9999).contains(&year).then_some(year as u32)
}
