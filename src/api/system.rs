use axum::{http::header, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

pub async fn health() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-cache, no-store")],
        Json(Health {
            status: "OK",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    )
}
