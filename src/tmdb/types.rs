use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three fields the chatbot shows for a movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

impl MovieSummary {
    pub fn from_value(movie: &Value) -> Self {
        let field = |name: &str| movie.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            title: field("title"),
            overview: field("overview"),
            release_date: field("release_date"),
        }
    }
}

/// Project the first `limit` entries of a TMDB `results` list.
pub fn summarize_results(page: &Value, limit: usize) -> Vec<MovieSummary> {
    page.get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .take(limit)
                .map(MovieSummary::from_value)
                .collect()
        })
        .unwrap_or_default()
}
