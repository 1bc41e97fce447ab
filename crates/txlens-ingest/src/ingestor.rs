//! The streaming ingestion engine.
//!
//! Replays validated records in time order with bounded memory and
//! observable progress: per step, nodes first, then edges, then the
//! checkpoint advance, then the cadence delay. Failed batches are
//! retried with exponential backoff; exhaustion halts the run at the
//! step boundary without advancing the checkpoint.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use txlens_core::{EdgeRecord, TimeStep, TransactionRecord};
use txlens_graph::{GraphStore, UpsertOutcome};

use crate::checkpoint::{CheckpointStore, IngestionCheckpoint};
use crate::clock::Clock;
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};

/// How a run ended when it did not error out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step was written and checkpointed.
    Completed,
    /// Cancellation was honored at a step boundary; checkpoint kept.
    Cancelled,
}

/// Shared, lock-free progress counters.
///
/// A caller holds a clone of the `Arc` and reads snapshots while the
/// run is in flight; nothing here blocks on completion.
pub struct IngestStats {
    nodes_inserted: AtomicU64,
    edges_inserted: AtomicU64,
    edges_skipped: AtomicU64,
    current_step: AtomicU32,
    cancel: AtomicBool,
    started: Instant,
}

impl IngestStats {
    fn new() -> Self {
        Self {
            nodes_inserted: AtomicU64::new(0),
            edges_inserted: AtomicU64::new(0),
            edges_skipped: AtomicU64::new(0),
            current_step: AtomicU32::new(0),
            cancel: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    /// Ask the run to stop at the next step boundary.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    // Consumed once a run has acted on it, so a later `start()` resumes
    // instead of replaying the cancellation.
    fn clear_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            nodes_inserted: self.nodes_inserted.load(Ordering::Relaxed),
            edges_inserted: self.edges_inserted.load(Ordering::Relaxed),
            edges_skipped: self.edges_skipped.load(Ordering::Relaxed),
            current_step: self.current_step.load(Ordering::Relaxed),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub nodes_inserted: u64,
    pub edges_inserted: u64,
    pub edges_skipped: u64,
    pub current_step: TimeStep,
    pub elapsed_ms: u64,
}

enum StepBatch<'a> {
    Nodes(&'a [TransactionRecord]),
    Edges(&'a [EdgeRecord]),
}

impl StepBatch<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Nodes(_) => "nodes",
            Self::Edges(_) => "edges",
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Nodes(b) => b.len(),
            Self::Edges(b) => b.len(),
        }
    }
}

/// Drives time-ordered batched writes through the graph store.
pub struct StreamingIngestor {
    store: Arc<dyn GraphStore>,
    clock: Arc<dyn Clock>,
    config: IngestConfig,
    stats: Arc<IngestStats>,
}

impl StreamingIngestor {
    pub fn new(store: Arc<dyn GraphStore>, clock: Arc<dyn Clock>, config: IngestConfig) -> Self {
        Self {
            store,
            clock,
            config,
            stats: Arc::new(IngestStats::new()),
        }
    }

    /// Handle for observing progress and requesting cancellation.
    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Replay `nodes` and `edges` step by step, resuming past any steps
    /// the checkpoint already covers. `version` is kept in sync with the
    /// checkpoint's cumulative-insert counter after every step.
    pub async fn run(
        &self,
        mut nodes: Vec<TransactionRecord>,
        edges: Vec<EdgeRecord>,
        checkpoint: &mut IngestionCheckpoint,
        checkpoint_store: &CheckpointStore,
        version: &AtomicU64,
    ) -> Result<RunOutcome> {
        if let Some(cap) = self.config.sample_size {
            if nodes.len() > cap {
                tracing::info!(cap, total = nodes.len(), "Sampling transaction records");
                nodes.truncate(cap);
            }
        }

        let mut node_steps: BTreeMap<TimeStep, Vec<TransactionRecord>> = BTreeMap::new();
        for record in nodes {
            node_steps.entry(record.time_step).or_default().push(record);
        }

        // With sampling in effect, edges past the last sampled node step
        // could never satisfy the endpoint invariant; drop them up front.
        let cap_step = self
            .config
            .sample_size
            .and_then(|_| node_steps.keys().next_back().copied());
        let mut edge_steps: BTreeMap<TimeStep, Vec<EdgeRecord>> = BTreeMap::new();
        for edge in edges {
            if cap_step.is_some_and(|max| edge.time_step > max) {
                continue;
            }
            edge_steps.entry(edge.time_step).or_default().push(edge);
        }

        let mut steps: BTreeSet<TimeStep> = node_steps.keys().copied().collect();
        steps.extend(edge_steps.keys().copied());
        if let Some(done) = checkpoint.last_step {
            steps.retain(|s| *s > done);
            tracing::info!(resume_after = done, remaining = steps.len(), "Resuming from checkpoint");
        }

        let total = steps.len();
        tracing::info!(steps = total, "Starting streaming ingestion");

        for (i, step) in steps.into_iter().enumerate() {
            if self.stats.cancel_requested() {
                tracing::warn!(step, "Cancellation honored at step boundary");
                self.stats.clear_cancel();
                return Ok(RunOutcome::Cancelled);
            }
            self.stats.current_step.store(step, Ordering::Relaxed);

            let node_batch = node_steps.remove(&step).unwrap_or_default();
            let edge_batch = edge_steps.remove(&step).unwrap_or_default();

            // Nodes of a step are fully acknowledged before its edges.
            let nodes_inserted = if node_batch.is_empty() {
                0
            } else {
                let outcomes = self
                    .upsert_with_retry(step, StepBatch::Nodes(&node_batch))
                    .await?;
                count_inserted(&outcomes)
            };

            let (edges_inserted, edges_skipped) = if edge_batch.is_empty() {
                (0, 0)
            } else {
                let outcomes = self
                    .upsert_with_retry(step, StepBatch::Edges(&edge_batch))
                    .await?;
                let skipped = outcomes.iter().filter(|o| o.is_skipped()).count() as u64;
                (count_inserted(&outcomes), skipped)
            };

            if edges_skipped > 0 {
                tracing::info!(step, skipped = edges_skipped, "Edges skipped: missing endpoints");
            }

            checkpoint.advance(step, nodes_inserted, edges_inserted, edges_skipped);
            checkpoint_store.save(checkpoint)?;
            version.store(checkpoint.dataset_version(), Ordering::Relaxed);

            self.stats
                .nodes_inserted
                .fetch_add(nodes_inserted, Ordering::Relaxed);
            self.stats
                .edges_inserted
                .fetch_add(edges_inserted, Ordering::Relaxed);
            self.stats
                .edges_skipped
                .fetch_add(edges_skipped, Ordering::Relaxed);

            if (i + 1) % 5 == 0 || i + 1 == total {
                let snap = self.stats.snapshot();
                tracing::info!(
                    step,
                    progress = format!("{}/{total}", i + 1),
                    nodes = snap.nodes_inserted,
                    edges = snap.edges_inserted,
                    skipped = snap.edges_skipped,
                    "Ingestion progress"
                );
            }

            if i + 1 < total {
                self.clock.sleep(self.config.delay_per_step()).await;
            }
        }

        // A cancellation arriving after the last boundary check must not
        // leak into the next run either.
        self.stats.clear_cancel();

        let snap = self.stats.snapshot();
        tracing::info!(
            nodes = snap.nodes_inserted,
            edges = snap.edges_inserted,
            skipped = snap.edges_skipped,
            elapsed_ms = snap.elapsed_ms,
            "Ingestion complete"
        );
        Ok(RunOutcome::Completed)
    }

    /// One batch with the retry/backoff policy. Store-level errors
    /// (timeouts included) retry the whole batch; documents that came
    /// back `Failed` retry alone, with the rest of the batch settled.
    /// Either way, exhaustion halts the step.
    async fn upsert_with_retry(
        &self,
        step: TimeStep,
        batch: StepBatch<'_>,
    ) -> Result<Vec<UpsertOutcome>> {
        let mut settled: Vec<Option<UpsertOutcome>> = (0..batch.len()).map(|_| None).collect();
        let mut pending: Vec<usize> = (0..batch.len()).collect();
        let mut attempt: u32 = 0;
        loop {
            let result = match &batch {
                StepBatch::Nodes(b) => {
                    let sub: Vec<TransactionRecord> =
                        pending.iter().map(|&i| b[i].clone()).collect();
                    self.store.upsert_nodes(&sub).await
                }
                StepBatch::Edges(b) => {
                    let sub: Vec<EdgeRecord> = pending.iter().map(|&i| b[i].clone()).collect();
                    self.store.upsert_edges(&sub).await
                }
            };
            let failure = match result {
                Ok(outcomes) => {
                    let mut still_failed = Vec::new();
                    let mut last_reason = String::new();
                    for (&slot, outcome) in pending.iter().zip(outcomes) {
                        if let UpsertOutcome::Failed(reason) = &outcome {
                            tracing::warn!(step, kind = batch.kind(), %reason, "Document failed");
                            still_failed.push(slot);
                            last_reason = reason.clone();
                        }
                        settled[slot] = Some(outcome);
                    }
                    if still_failed.is_empty() {
                        return Ok(settled.into_iter().flatten().collect());
                    }
                    pending = still_failed;
                    format!("{} document(s) failed: {last_reason}", pending.len())
                }
                Err(e) => e.to_string(),
            };

            if attempt >= self.config.max_retries_per_batch {
                return Err(IngestError::RetriesExhausted {
                    step,
                    attempts: attempt + 1,
                    reason: failure,
                });
            }
            let backoff = self.config.retry_backoff() * 2u32.saturating_pow(attempt);
            tracing::warn!(
                step,
                kind = batch.kind(),
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "Batch failed; backing off"
            );
            self.clock.sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn count_inserted(outcomes: &[UpsertOutcome]) -> u64 {
    outcomes.iter().filter(|o| o.is_inserted()).count() as u64
}
