use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use super::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    #[serde(default)]
    pub movie_id: Option<Value>,
}

/// The movie id may arrive as a number or a string.
fn movie_id_arg(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

pub async fn predict(
    State(state): State<AppState>,
    request: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = request?;
    let movie_id = movie_id_arg(request.movie_id.as_ref())
        .ok_or_else(|| ApiError::BadRequest("movieId is required".to_string()))?;

    match state.recommender.recommend(&movie_id).await {
        Ok(recommendations) => Ok(Json(recommendations)),
        Err(e) => {
            error!(movie_id = %movie_id, error = %e, "Error getting recommendations");
            Err(ApiError::internal("Failed to get recommendations"))
        }
    }
}
