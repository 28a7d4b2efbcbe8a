//! Replay executor — serves recorded stage outputs from a directory.
//!
//! Each tier reads `<dir>/<tier name>.json`. A recording may also script a
//! failure instead of a transcript:
//!
//! ```json
//! { "error": "ffmpeg exited with status 1" }
//! { "hang": true }
//! ```
//!
//! `hang` blocks until the controller's per-attempt timeout or
//! cancellation fires. A missing file is a stage failure.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tierlift::{StageError, StageExecutor, StageOutput, Tier};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct ReplayExecutor {
    dir: PathBuf,
    latency: Duration,
}

impl ReplayExecutor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            latency: Duration::ZERO,
        }
    }

    /// Simulated processing time per attempt, scaled by tier cost.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn recording_path(&self, tier: &Tier) -> PathBuf {
        self.dir.join(format!("{}.json", tier.name))
    }

    /// Latency scaled by tier cost, saturating at `Duration::MAX`.
    pub fn delay_for(&self, tier: &Tier) -> Duration {
        Duration::try_from_secs_f64(self.latency.as_secs_f64() * tier.baseline_cost)
            .unwrap_or(Duration::MAX)
    }
}

async fn load(path: &Path) -> Result<Value, StageError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StageError::failed(format!("no recording at {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| StageError::failed(format!("unreadable recording {}: {}", path.display(), e)))
}

#[async_trait]
impl StageExecutor for ReplayExecutor {
    type Output = StageOutput;

    async fn execute(
        &self,
        tier: &Tier,
        cancel: CancellationToken,
    ) -> Result<StageOutput, StageError> {
        let path = self.recording_path(tier);
        debug!(tier = %tier.name, path = %path.display(), "replaying recording");
        let value = load(&path).await?;

        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(StageError::failed(message));
        }
        if value.get("hang").and_then(Value::as_bool).unwrap_or(false) {
            cancel.cancelled().await;
            return Err(StageError::Cancelled);
        }

        if !self.latency.is_zero() {
            let delay = self.delay_for(tier);
            tokio::select! {
                _ = cancel.cancelled() => return Err(StageError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Ok(StageOutput::from_json(&value))
    }
}
