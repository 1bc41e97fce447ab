//! Ingestion checkpoint — persisted progress for resumable runs.
//!
//! Stored as a single JSON file so a restarted run resumes from the last
//! fully written step instead of re-streaming from the start.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use txlens_core::TimeStep;

use crate::error::Result;

/// Last successfully completed step plus cumulative counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionCheckpoint {
    pub run_id: Uuid,
    /// Last fully written step; `None` before the first step completes.
    pub last_step: Option<TimeStep>,
    pub nodes_inserted: u64,
    pub edges_inserted: u64,
    pub edges_skipped: u64,
    pub updated_at: DateTime<Utc>,
}

impl IngestionCheckpoint {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            last_step: None,
            nodes_inserted: 0,
            edges_inserted: 0,
            edges_skipped: 0,
            updated_at: Utc::now(),
        }
    }

    /// Record a fully written step.
    pub fn advance(&mut self, step: TimeStep, nodes: u64, edges: u64, skipped: u64) {
        self.last_step = Some(step);
        self.nodes_inserted += nodes;
        self.edges_inserted += edges;
        self.edges_skipped += skipped;
        self.updated_at = Utc::now();
    }

    /// Monotonic cumulative-insert counter used for cache invalidation.
    pub fn dataset_version(&self) -> u64 {
        self.nodes_inserted + self.edges_inserted
    }
}

impl Default for IngestionCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

/// File-backed checkpoint persistence.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted checkpoint, if any.
    pub fn load(&self) -> Result<Option<IngestionCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save(&self, checkpoint: &IngestionCheckpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(checkpoint)?;
        // Write-then-rename so a crash mid-save never corrupts the file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            step = ?checkpoint.last_step,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Remove the persisted checkpoint (full reset).
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
