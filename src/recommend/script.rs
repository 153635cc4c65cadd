use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{RecommendError, RecommendationProvider};
use crate::config::RecommenderConfig;

/// Runs an external script with the movie id as its only argument and
/// reads one line of JSON from its stdout.
pub struct ScriptRecommender {
    interpreter: String,
    script: PathBuf,
    unbuffered: bool,
}

impl ScriptRecommender {
    pub fn new(config: &RecommenderConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            script: PathBuf::from(&config.script),
            unbuffered: config.unbuffered,
        }
    }

    fn command(&self, movie_id: &str) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        if self.unbuffered {
            cmd.arg("-u");
        }
        cmd.arg(&self.script).arg(movie_id).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RecommendationProvider for ScriptRecommender {
    async fn recommend(&self, movie_id: &str) -> Result<Value, RecommendError> {
        debug!(script = %self.script.display(), movie_id, "Running recommender");

        let output = self.command(movie_id).output().await?;
        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Recommender exited with failure"
            );
        }

        parse_first_line(&output.stdout)
    }
}

fn parse_first_line(stdout: &[u8]) -> Result<Value, RecommendError> {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| RecommendError::SubprocessOutput("empty output".to_string()))?;

    serde_json::from_str(line).map_err(|e| RecommendError::SubprocessOutput(e.to_string()))
}
