use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use super::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::tmdb::mood::{pick_suggestions, SUGGESTION_LIMIT};
use crate::tmdb::{find_mood, MoodPreset, MOODS};

#[derive(Debug, Serialize)]
pub struct MoodSuggestions {
    pub mood: &'static str,
    pub results: Vec<Value>,
}

pub async fn list_moods() -> Json<&'static [MoodPreset]> {
    Json(MOODS)
}

pub async fn suggestions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<MoodSuggestions>> {
    let mood = find_mood(&name).ok_or_else(|| ApiError::NotFound(format!("Unknown mood: {}", name)))?;

    let page = state.tmdb.discover_mood(mood).await.map_err(|e| {
        error!(mood = mood.name, error = %e, "Error fetching mood-based movies");
        ApiError::internal("Failed to fetch mood-based movies")
    })?;

    let results = pick_suggestions(&page, SUGGESTION_LIMIT, &mut rand::thread_rng());
    Ok(Json(MoodSuggestions {
        mood: mood.name,
        results,
    }))
}
