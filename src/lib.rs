pub mod api;
pub mod chat;
pub mod config;
pub mod middleware;
pub mod nlu;
pub mod recommend;
pub mod server;
pub mod tmdb;

#[cfg(test)]
pub(crate) mod testutil;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Server error: {0}")]
    Server(String),
}

pub fn build_state(config: config::Config) -> Result<server::AppState, ServerError> {
    let transport = Arc::new(tmdb::ReqwestTransport::new()?);
    let tmdb = Arc::new(tmdb::TmdbClient::new(&config.tmdb, transport));
    let recommender = Arc::new(recommend::ScriptRecommender::new(&config.recommender));
    let detector = Arc::new(nlu::DialogflowClient::new(&config.dialogflow)?);

    Ok(server::AppState::new(config, tmdb, recommender, detector))
}

pub async fn run(config_path: &str, debug_logs: bool) -> Result<(), ServerError> {
    let config = config::Config::load(config_path)?;

    info!("Using config file: {}", config_path);
    if debug_logs {
        info!("Debug logging enabled");
    }
    if config.tmdb.api_key.is_none() {
        warn!("TMDB_API_KEY is not set; movie routes will fail until it is configured");
    }
    if config.dialogflow.project_id.is_none() {
        warn!("DIALOGFLOW_PROJECT_ID is not set; the chatbot will not answer");
    }
    if config.database_uri.is_some() {
        info!("Database URI configured but unused; this server keeps no persistent state");
    }

    let address = config.listen.address.as_deref().unwrap_or("[::]");
    let port = &config.listen.port;
    let addr: SocketAddr = format!("{}:{}", address, port)
        .parse()
        .map_err(|e| ServerError::Server(format!("Invalid address: {}", e)))?;

    let tls = match (&config.listen.tlscert, &config.listen.tlskey) {
        (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
        _ => None,
    };

    let state = build_state(config)?;
    info!(session = %state.chat.default_session(), "Chat fallback session created");
    let app = server::build_router(state);

    if let Some((cert_path, key_path)) = tls {
        info!("Loading TLS certificate from {}", cert_path);
        info!("Loading TLS key from {}", key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to load TLS config: {}", e)))?;

        info!("Serving HTTPS on {}", addr);

        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    } else {
        info!("Serving HTTP on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
    }

    Ok(())
}
