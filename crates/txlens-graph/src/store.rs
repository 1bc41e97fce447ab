//! The graph store capability contract.
//!
//! Writes are batch upserts with per-document outcomes; reads are named,
//! parameterized, read-only query descriptors returning ordered rows.

use std::collections::BTreeMap;

use async_trait::async_trait;

use txlens_core::{EdgeRecord, TransactionRecord, TxId};

/// A single result row: field name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Named query parameters. A `BTreeMap` so the encoding is canonical.
pub type QueryParams = BTreeMap<String, serde_json::Value>;

/// Errors from graph store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Schema setup failed: {0}")]
    Schema(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Backend error: {0}")]
    Backend(#[from] neo4rs::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Per-document outcome of a batch upsert.
///
/// One bad document never fails the whole batch; the caller inspects
/// the outcome list instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Document written for the first time.
    Inserted,
    /// Key already present; the write was an idempotent no-op.
    Unchanged,
    /// Edge referenced an endpoint not yet in the store. Counted, not fatal.
    SkippedMissingEndpoint,
    /// This document failed; the rest of the batch is unaffected.
    Failed(String),
}

impl UpsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::SkippedMissingEndpoint)
    }
}

/// Node/edge totals currently persisted in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub nodes: u64,
    pub edges: u64,
}

// ── Query descriptors ─────────────────────────────────────────────

/// Expected type of a named query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Integer,
}

/// Declared parameter of a [`QueryDescriptor`].
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

/// Type of a declared output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
}

/// Declared output column of a [`QueryDescriptor`].
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// A named, parameterized, read-only query.
///
/// The Cypher body is what the Neo4j backend executes; the in-memory
/// backend dispatches on `name`. Both return rows shaped by `columns`.
#[derive(Debug, Clone, Copy)]
pub struct QueryDescriptor {
    pub name: &'static str,
    pub cypher: &'static str,
    pub params: &'static [ParamSpec],
    pub columns: &'static [ColumnSpec],
}

impl QueryDescriptor {
    /// Validate `params` against the declared schema.
    pub fn check_params(&self, params: &QueryParams) -> Result<()> {
        for spec in self.params {
            match params.get(spec.name) {
                None if spec.required => {
                    return Err(StoreError::Query(format!(
                        "missing required parameter `{}` for query `{}`",
                        spec.name, self.name
                    )));
                }
                None => {}
                Some(value) => {
                    let ok = match spec.kind {
                        ParamKind::Text => value.is_string(),
                        ParamKind::Integer => value.is_i64() || value.is_u64(),
                    };
                    if !ok {
                        return Err(StoreError::Query(format!(
                            "parameter `{}` of query `{}` has the wrong type",
                            spec.name, self.name
                        )));
                    }
                }
            }
        }
        for name in params.keys() {
            if !self.params.iter().any(|spec| spec.name == name) {
                return Err(StoreError::Query(format!(
                    "unexpected parameter `{name}` for query `{}`",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

// ── The capability trait ──────────────────────────────────────────

/// Capability interface over the transaction graph store.
///
/// Implementations must make `upsert_nodes`/`upsert_edges` idempotent:
/// node identity is `tx_id`, edge identity is `(from, to, time_step)`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Idempotently create collections/constraints and the indexes on
    /// `tx_id`, `time_step` and `class_label`.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert-or-skip each transaction by `tx_id`. Existing nodes are
    /// left untouched (labels and features are immutable).
    async fn upsert_nodes(&self, batch: &[TransactionRecord]) -> Result<Vec<UpsertOutcome>>;

    /// Insert-or-skip each edge. An edge whose endpoints are not both
    /// present (at a step no later than the edge's) reports
    /// [`UpsertOutcome::SkippedMissingEndpoint`].
    async fn upsert_edges(&self, batch: &[EdgeRecord]) -> Result<Vec<UpsertOutcome>>;

    /// Execute a read-only query, returning an ordered row sequence.
    async fn run_query(&self, descriptor: &QueryDescriptor, params: &QueryParams)
        -> Result<Vec<Row>>;

    /// Whether a transaction node exists.
    async fn node_exists(&self, tx_id: &TxId) -> Result<bool>;

    /// Persisted node/edge totals.
    async fn counts(&self) -> Result<StoreCounts>;
}
