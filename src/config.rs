use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::tmdb::RetryPolicy;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub dialogflow: DialogflowConfig,
    #[serde(default)]
    pub recommender: RecommenderConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Accepted for compatibility with older deployments; nothing reads it.
    #[serde(default)]
    pub database_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    #[serde(default, alias = "apikey")]
    pub api_key: Option<String>,
    #[serde(default = "default_tmdb_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_tmdb_base_url(),
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl TmdbConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            timeout: Duration::from_millis(self.timeout_ms),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DialogflowConfig {
    #[serde(default, alias = "projectid")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_dialogflow_endpoint")]
    pub endpoint: String,
}

impl Default for DialogflowConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            access_token: None,
            endpoint: default_dialogflow_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommenderConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_script")]
    pub script: String,
    #[serde(default = "default_true")]
    pub unbuffered: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: default_script(),
            unbuffered: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CorsConfig {
    #[serde(default, alias = "allowedorigins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> String {
    "5000".to_string()
}

fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_initial_backoff_ms() -> u64 {
    1_500
}

fn default_dialogflow_endpoint() -> String {
    "https://dialogflow.googleapis.com/v2".to_string()
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_script() -> String {
    "ml_model/recommend.py".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        Self::from_yaml(path, &content)
    }

    fn from_yaml(path: &str, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(path.to_string(), e))
    }

    /// Load the config file if it exists, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Environment variables win over file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("TMDB_API_KEY") {
            self.tmdb.api_key = Some(key);
        }
        if let Some(url) = get("TMDB_BASE_URL") {
            self.tmdb.base_url = url;
        }
        if let Some(project) = get("DIALOGFLOW_PROJECT_ID") {
            self.dialogflow.project_id = Some(project);
        }
        if let Some(token) = get("DIALOGFLOW_ACCESS_TOKEN") {
            self.dialogflow.access_token = Some(token);
        }
        if let Some(port) = get("PORT") {
            if port.parse::<u16>().is_err() {
                return Err(ConfigError::InvalidValue("PORT".to_string(), port));
            }
            self.listen.port = port;
        }
        if let Some(origins) = get("ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(uri) = get("MONGODB_URI") {
            self.database_uri = Some(uri);
        }
        if let Some(script) = get("RECOMMENDER_SCRIPT") {
            self.recommender.script = script;
        }
        if let Some(interpreter) = get("RECOMMENDER_INTERPRETER") {
            self.recommender.interpreter = interpreter;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
