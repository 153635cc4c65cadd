use axum::{
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::api;
use crate::chat::ChatService;
use crate::config::Config;
use crate::nlu::IntentDetector;
use crate::recommend::RecommendationProvider;
use crate::tmdb::TmdbClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tmdb: Arc<TmdbClient>,
    pub recommender: Arc<dyn RecommendationProvider>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(
        config: Config,
        tmdb: Arc<TmdbClient>,
        recommender: Arc<dyn RecommendationProvider>,
        detector: Arc<dyn IntentDetector>,
    ) -> Self {
        let chat = Arc::new(ChatService::new(tmdb.clone(), detector));
        Self {
            config: Arc::new(config),
            tmdb,
            recommender,
            chat,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let movie_routes = Router::new()
        .route("/api/movies/popular", get(api::movies::popular))
        .route("/api/movies/trending", get(api::movies::trending))
        .route("/api/movies/search", get(api::movies::search))
        .route("/api/movies/:id", get(api::movies::details))
        .route("/api/movies/:id/videos", get(api::movies::videos))
        .route("/api/movies/:id/providers", get(api::movies::providers))
        .route("/api/movies/:id/recommendations", get(api::movies::similar))
        .route("/api/moods", get(api::moods::list_moods))
        .route("/api/moods/:mood", get(api::moods::suggestions));

    let service_routes = Router::new()
        .route("/api/recommendations/predict", post(api::recommend::predict))
        .route("/api/chatbot/query", post(api::chatbot::query));

    let cors = crate::middleware::cors_layer(&state.config.cors);

    let router = Router::new()
        .route("/health", get(api::system::health))
        .merge(movie_routes)
        .merge(service_routes)
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Path rewriting must happen before routing, so it wraps the router.
    Router::new()
        .fallback_service(router)
        .layer(axum::middleware::from_fn(crate::middleware::normalize_path))
}

async fn fallback_handler(req: Request) -> impl IntoResponse {
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    api::ApiError::NotFound("Not found".to_string()).into_response()
}
