use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use super::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::tmdb::{TmdbError, TmdbResult};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// Log the real cause, hand the client a generic message.
fn upstream<T>(result: TmdbResult<T>, what: &str) -> ApiResult<T> {
    result.map_err(|e| {
        match &e {
            TmdbError::MissingApiKey => error!("Cannot {}: TMDB API key missing", what),
            other => error!(error = %other, "Error trying to {}", what),
        }
        ApiError::Internal(format!("Failed to {}", what))
    })
}

pub async fn popular(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    upstream(state.tmdb.popular().await, "fetch popular movies").map(Json)
}

pub async fn trending(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    upstream(state.tmdb.trending_week().await, "fetch trending movies").map(Json)
}

pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params?;
    let query = params
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("query is required".to_string()))?;

    upstream(state.tmdb.search(&query).await, "search movies").map(Json)
}

pub async fn details(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    upstream(state.tmdb.movie(id).await, "fetch movie details").map(Json)
}

pub async fn videos(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    upstream(state.tmdb.videos(id).await, "fetch movie videos").map(Json)
}

pub async fn providers(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    upstream(state.tmdb.watch_providers(id).await, "fetch watch providers").map(Json)
}

pub async fn similar(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    upstream(state.tmdb.recommendations(id).await, "fetch similar movies").map(Json)
}
