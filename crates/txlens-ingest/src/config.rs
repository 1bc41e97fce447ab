//! Configuration for the streaming ingestion engine.

use std::time::Duration;

use serde::Deserialize;

/// Top-level ingestion configuration.
///
/// Loaded from `txlens.toml` `[ingest]` section or
/// `TXLENS_INGEST__` environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Simulated real-time cadence: pause between consecutive steps.
    #[serde(default = "default_delay_ms")]
    pub delay_per_step_ms: u64,

    /// Optional cap on total transaction records, applied before grouping.
    #[serde(default)]
    pub sample_size: Option<usize>,

    /// Retries per node/edge batch before the step is marked failed.
    #[serde(default = "default_max_retries")]
    pub max_retries_per_batch: u32,

    /// Base backoff; doubles on every retry.
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Where the ingestion checkpoint is persisted.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
}

impl IngestConfig {
    pub fn delay_per_step(&self) -> Duration {
        Duration::from_millis(self.delay_per_step_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_delay_ms() -> u64 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_checkpoint_path() -> String {
    "./txlens-checkpoint.json".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delay_per_step_ms: default_delay_ms(),
            sample_size: None,
            max_retries_per_batch: default_max_retries(),
            retry_backoff_ms: default_backoff_ms(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}
