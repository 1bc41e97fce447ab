//! Shared test doubles for the ingest crate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use txlens_core::{ClassLabel, EdgeRecord, FeatureVector, TimeStep, TransactionRecord, TxId};
use txlens_graph::store::Result as StoreResult;
use txlens_graph::{GraphStore, MemoryStore, QueryDescriptor, QueryParams, Row, StoreCounts,
    StoreError, UpsertOutcome};

pub fn tx(id: &str, label: ClassLabel, step: TimeStep) -> TransactionRecord {
    TransactionRecord {
        tx_id: TxId::new(id),
        class_label: label,
        time_step: step,
        features: FeatureVector::zeroed(),
    }
}

pub fn edge(from: &str, to: &str, step: TimeStep) -> EdgeRecord {
    EdgeRecord {
        from_tx: TxId::new(from),
        to_tx: TxId::new(to),
        time_step: step,
    }
}

/// Store wrapper that journals batch calls and injects batch failures.
///
/// Delegates real semantics to [`MemoryStore`]; the journal records
/// `"nodes@<step>"` / `"edges@<step>"` entries in call order so tests
/// can assert the ordering invariant.
#[derive(Default)]
pub struct JournalStore {
    inner: MemoryStore,
    journal: Mutex<Vec<String>>,
    failing_node_batches: AtomicU32,
    failing_doc: Mutex<Option<(String, u32)>>,
}

impl JournalStore {
    pub fn ops(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Make the next `n` node-batch calls fail with a write error.
    pub fn fail_node_batches(&self, n: u32) {
        self.failing_node_batches.store(n, Ordering::SeqCst);
    }

    /// Make the node with `tx_id` report a per-document failure on its
    /// next `times` upsert attempts; the rest of its batch succeeds.
    pub fn fail_node_doc(&self, tx_id: &str, times: u32) {
        *self.failing_doc.lock().unwrap() = Some((tx_id.to_string(), times));
    }

    fn doc_should_fail(&self, tx_id: &TxId) -> bool {
        let mut slot = self.failing_doc.lock().unwrap();
        match slot.as_mut() {
            Some((id, times)) if id == tx_id.as_str() && *times > 0 => {
                *times -= 1;
                true
            }
            _ => false,
        }
    }

    fn record(&self, kind: &str, step: Option<TimeStep>) {
        let entry = match step {
            Some(s) => format!("{kind}@{s}"),
            None => kind.to_string(),
        };
        self.journal.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl GraphStore for JournalStore {
    async fn ensure_schema(&self) -> StoreResult<()> {
        self.inner.ensure_schema().await
    }

    async fn upsert_nodes(&self, batch: &[TransactionRecord]) -> StoreResult<Vec<UpsertOutcome>> {
        self.record("nodes", batch.first().map(|r| r.time_step));
        if self.failing_node_batches.load(Ordering::SeqCst) > 0 {
            self.failing_node_batches.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Write("injected failure".to_string()));
        }
        let mut outcomes = Vec::with_capacity(batch.len());
        for record in batch {
            if self.doc_should_fail(&record.tx_id) {
                outcomes.push(UpsertOutcome::Failed("injected document failure".to_string()));
            } else {
                outcomes.extend(self.inner.upsert_nodes(std::slice::from_ref(record)).await?);
            }
        }
        Ok(outcomes)
    }

    async fn upsert_edges(&self, batch: &[EdgeRecord]) -> StoreResult<Vec<UpsertOutcome>> {
        self.record("edges", batch.first().map(|e| e.time_step));
        self.inner.upsert_edges(batch).await
    }

    async fn run_query(
        &self,
        descriptor: &QueryDescriptor,
        params: &QueryParams,
    ) -> StoreResult<Vec<Row>> {
        self.inner.run_query(descriptor, params).await
    }

    async fn node_exists(&self, tx_id: &TxId) -> StoreResult<bool> {
        self.inner.node_exists(tx_id).await
    }

    async fn counts(&self) -> StoreResult<StoreCounts> {
        self.inner.counts().await
    }
}
