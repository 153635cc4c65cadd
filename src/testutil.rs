//! Fakes shared by unit tests.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

use crate::nlu::{IntentDetector, NluError, NluResult, QueryResult};
use crate::recommend::{RecommendError, RecommendationProvider};
use crate::tmdb::{RawResponse, Transport, TransportError};

pub(crate) enum Step {
    Respond(u16, String),
    Hang,
    Fail(TransportError),
}

/// Plays back a fixed list of outcomes, one per request.
pub(crate) struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<(u16, String)>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answers every request with the same response.
    pub(crate) fn always(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Some((status, body.to_string())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let step = self.steps.lock().unwrap().pop_front();
        let step = match (step, &self.fallback) {
            (Some(step), _) => step,
            (None, Some((status, body))) => Step::Respond(*status, body.clone()),
            (None, None) => panic!("unexpected request to {}", url),
        };

        match step {
            Step::Respond(status, body) => Ok(RawResponse {
                status,
                body: body.into_bytes(),
            }),
            Step::Hang => std::future::pending().await,
            Step::Fail(err) => Err(err),
        }
    }
}

/// Returns a canned intent and remembers what it was asked.
pub(crate) struct FakeDetector {
    result: Option<QueryResult>,
    pub(crate) seen: Mutex<Vec<(String, String, String)>>,
}

impl FakeDetector {
    pub(crate) fn intent(name: &str, parameters: Value, fulfillment: &str) -> Arc<Self> {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Arc::new(Self {
            result: Some(QueryResult {
                intent: Some(name.to_string()),
                fulfillment_text: Some(fulfillment.to_string()).filter(|s| !s.is_empty()),
                parameters,
            }),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn no_intent(fulfillment: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            result: Some(QueryResult {
                intent: None,
                fulfillment_text: fulfillment.map(str::to_string),
                parameters: Map::new(),
            }),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: None,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl IntentDetector for FakeDetector {
    async fn detect(&self, session: &str, text: &str, language: &str) -> NluResult<QueryResult> {
        self.seen.lock().unwrap().push((
            session.to_string(),
            text.to_string(),
            language.to_string(),
        ));
        self.result
            .clone()
            .ok_or_else(|| NluError::Status(503, "unavailable".to_string()))
    }
}

pub(crate) struct FakeRecommender {
    pub(crate) answer: Option<Value>,
}

#[async_trait]
impl RecommendationProvider for FakeRecommender {
    async fn recommend(&self, movie_id: &str) -> Result<Value, RecommendError> {
        match &self.answer {
            Some(answer) => Ok(serde_json::json!({ "for": movie_id, "items": answer })),
            None => Err(RecommendError::SubprocessOutput("no output".to_string())),
        }
    }
}
