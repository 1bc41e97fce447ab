//! Run orchestration and the ingestion state machine.
//!
//! `Idle → Running → {Completed, Failed}`; `Failed` resumes back into
//! `Running` from the persisted checkpoint, `Completed` is terminal
//! until a full reset. The supervisor owns the checkpoint store and the
//! dataset-version counter that downstream caches key on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use txlens_core::{EdgeRecord, TransactionRecord};
use txlens_graph::GraphStore;

use crate::checkpoint::{CheckpointStore, IngestionCheckpoint};
use crate::clock::Clock;
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::ingestor::{IngestStats, RunOutcome, StreamingIngestor};

/// Lifecycle of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Orchestrates the ingestor and exposes state, stats, checkpoint and
/// dataset version to callers.
pub struct IngestionSupervisor {
    store: Arc<dyn GraphStore>,
    ingestor: StreamingIngestor,
    checkpoint_store: CheckpointStore,
    state: Mutex<RunState>,
    dataset_version: Arc<AtomicU64>,
}

impl IngestionSupervisor {
    /// Build a supervisor over `store`. Seeds the dataset version from a
    /// previously persisted checkpoint so resumed deployments keep their
    /// cache-invalidation counter monotonic.
    pub fn new(
        store: Arc<dyn GraphStore>,
        clock: Arc<dyn Clock>,
        config: IngestConfig,
    ) -> Result<Self> {
        let checkpoint_store = CheckpointStore::new(&config.checkpoint_path);
        let seed = checkpoint_store
            .load()?
            .map(|cp| cp.dataset_version())
            .unwrap_or(0);
        let ingestor = StreamingIngestor::new(store.clone(), clock, config);
        Ok(Self {
            store,
            ingestor,
            checkpoint_store,
            state: Mutex::new(RunState::Idle),
            dataset_version: Arc::new(AtomicU64::new(seed)),
        })
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Progress/cancellation handle; readable while a run is in flight.
    pub fn stats(&self) -> Arc<IngestStats> {
        self.ingestor.stats()
    }

    /// Cumulative-insert counter; bumps on every checkpointed step.
    pub fn dataset_version(&self) -> u64 {
        self.dataset_version.load(Ordering::Relaxed)
    }

    /// Shared handle for cache layers keying on the dataset version.
    pub fn version_handle(&self) -> Arc<AtomicU64> {
        self.dataset_version.clone()
    }

    pub fn checkpoint(&self) -> Result<Option<IngestionCheckpoint>> {
        self.checkpoint_store.load()
    }

    /// Run ingestion to completion. Valid from `Idle` and from `Failed`
    /// (resume); the checkpoint decides where the replay picks up.
    pub async fn start(
        &self,
        nodes: Vec<TransactionRecord>,
        edges: Vec<EdgeRecord>,
    ) -> Result<RunState> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                RunState::Idle | RunState::Failed => *state = RunState::Running,
                RunState::Running => return Err(IngestError::InvalidState("a run is in flight")),
                RunState::Completed => {
                    return Err(IngestError::InvalidState("completed; reset first"))
                }
            }
        }

        // Schema problems are fatal at startup, before any batch.
        if let Err(e) = self.store.ensure_schema().await {
            self.set_state(RunState::Failed);
            return Err(e.into());
        }

        // A corrupt checkpoint file must not strand the state in Running.
        let mut checkpoint = match self.checkpoint_store.load() {
            Ok(loaded) => loaded.unwrap_or_else(IngestionCheckpoint::new),
            Err(e) => {
                self.set_state(RunState::Failed);
                return Err(e);
            }
        };

        let result = self
            .ingestor
            .run(
                nodes,
                edges,
                &mut checkpoint,
                &self.checkpoint_store,
                &self.dataset_version,
            )
            .await;

        let next = match result {
            Ok(RunOutcome::Completed) => RunState::Completed,
            Ok(RunOutcome::Cancelled) => RunState::Idle,
            Err(e) => {
                self.set_state(RunState::Failed);
                return Err(e);
            }
        };
        self.set_state(next);
        Ok(next)
    }

    /// Full reset: drop the checkpoint and return to `Idle`. The version
    /// counter restarts, so any cache built on the old handle must be
    /// dropped with it.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == RunState::Running {
            return Err(IngestError::InvalidState("a run is in flight"));
        }
        self.checkpoint_store.clear()?;
        self.dataset_version.store(0, Ordering::Relaxed);
        *state = RunState::Idle;
        tracing::info!("Ingestion state reset");
        Ok(())
    }

    fn set_state(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::NoopClock;
    use crate::testutil::{edge, tx, JournalStore};
    use txlens_core::ClassLabel;
    use txlens_graph::MemoryStore;

    fn config_in(dir: &tempfile::TempDir) -> IngestConfig {
        IngestConfig {
            delay_per_step_ms: 0,
            retry_backoff_ms: 0,
            checkpoint_path: dir
                .path()
                .join("cp.json")
                .to_string_lossy()
                .into_owned(),
            ..IngestConfig::default()
        }
    }

    fn supervisor_with(
        store: Arc<dyn GraphStore>,
        dir: &tempfile::TempDir,
    ) -> IngestionSupervisor {
        IngestionSupervisor::new(store, Arc::new(NoopClock), config_in(dir)).unwrap()
    }

    #[tokio::test]
    async fn test_idle_to_running_to_completed() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor_with(Arc::new(MemoryStore::new()), &dir);
        assert_eq!(sup.state(), RunState::Idle);

        let state = sup
            .start(vec![tx("a", ClassLabel::Licit, 1)], vec![])
            .await
            .unwrap();
        assert_eq!(state, RunState::Completed);
        assert_eq!(sup.dataset_version(), 1);
        assert_eq!(sup.checkpoint().unwrap().unwrap().last_step, Some(1));
    }

    #[tokio::test]
    async fn test_completed_requires_reset_before_restart() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor_with(Arc::new(MemoryStore::new()), &dir);
        sup.start(vec![tx("a", ClassLabel::Licit, 1)], vec![])
            .await
            .unwrap();

        let err = sup.start(vec![], vec![]).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidState(_)));

        sup.reset().unwrap();
        assert_eq!(sup.state(), RunState::Idle);
        assert_eq!(sup.dataset_version(), 0);
        assert!(sup.checkpoint().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_is_resumable_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(JournalStore::default());
        let sup = supervisor_with(journal.clone(), &dir);

        let nodes = vec![tx("a", ClassLabel::Illicit, 1), tx("b", ClassLabel::Illicit, 2)];
        let edges = vec![edge("a", "b", 2)];

        // Fail every attempt at the first step (budget is 3 retries).
        journal.fail_node_batches(4);
        let err = sup.start(nodes.clone(), edges.clone()).await.unwrap_err();
        assert!(matches!(err, IngestError::RetriesExhausted { step: 1, .. }));
        assert_eq!(sup.state(), RunState::Failed);
        // Step 1 never completed, so nothing was checkpointed.
        assert!(sup.checkpoint().unwrap().is_none());

        // Resume: the store is healthy again.
        let state = sup.start(nodes, edges).await.unwrap();
        assert_eq!(state, RunState::Completed);
        assert_eq!(sup.dataset_version(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_run_restarts_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let sup = supervisor_with(store.clone(), &dir);

        let nodes = vec![tx("a", ClassLabel::Licit, 1)];
        sup.stats().request_cancel();
        let state = sup.start(nodes.clone(), vec![]).await.unwrap();
        assert_eq!(state, RunState::Idle);
        assert_eq!(store.counts().await.unwrap().nodes, 0);

        // The consumed cancellation does not bleed into the next start.
        let state = sup.start(nodes, vec![]).await.unwrap();
        assert_eq!(state, RunState::Completed);
        assert_eq!(sup.dataset_version(), 1);
        assert_eq!(store.counts().await.unwrap().nodes, 1);
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_fails_the_run_and_reset_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor_with(Arc::new(MemoryStore::new()), &dir);
        std::fs::write(dir.path().join("cp.json"), "{not json").unwrap();

        let nodes = vec![tx("a", ClassLabel::Licit, 1)];
        let err = sup.start(nodes.clone(), vec![]).await.unwrap_err();
        assert!(matches!(err, IngestError::Serialization(_)));
        assert_eq!(sup.state(), RunState::Failed);

        sup.reset().unwrap();
        let state = sup.start(nodes, vec![]).await.unwrap();
        assert_eq!(state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_version_seeded_from_persisted_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
        {
            let sup = supervisor_with(store.clone(), &dir);
            sup.start(vec![tx("a", ClassLabel::Licit, 1)], vec![])
                .await
                .unwrap();
        }
        // A new supervisor over the same checkpoint path keeps the counter.
        let sup = supervisor_with(store, &dir);
        assert_eq!(sup.dataset_version(), 1);
    }
}
