use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::error;

use super::error::{ApiError, ApiResult};
use crate::chat::{ChatError, ChatReply, ChatRequest};
use crate::server::AppState;

const CHAT_FAILURE: &str =
    "Error processing your request. The movie database might be temporarily busy or unavailable.";

pub async fn query(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatReply>> {
    let Json(request) = request?;
    match state.chat.handle(request).await {
        Ok(reply) => Ok(Json(reply)),
        Err(ChatError::MissingQuery) => Err(ApiError::BadRequest("queryText is required".to_string())),
        Err(ChatError::MissingApiKey) => {
            error!("Chat request rejected: TMDB API key missing");
            Err(ApiError::internal("Server configuration error: TMDB API key missing."))
        }
        Err(e) => {
            error!(error = %e, "Error processing chatbot request");
            Err(ApiError::internal(CHAT_FAILURE))
        }
    }
}
