//! In-memory [`GraphStore`] backend.
//!
//! Deterministic, dependency-free implementation of the same wire
//! contract as the Neo4j backend. Used by tests and offline runs;
//! query dispatch is keyed on the descriptor name and produces rows
//! with the same columns and ordering as the Cypher bodies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;

use txlens_core::{ClassLabel, EdgeRecord, TimeStep, TransactionRecord, TxId};

use crate::store::{
    GraphStore, QueryDescriptor, QueryParams, Result, Row, StoreCounts, StoreError, UpsertOutcome,
};

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<TxId, TransactionRecord>,
    edges: BTreeSet<EdgeRecord>,
    schema_ready: bool,
}

/// Adjacency-free reference store; all queries scan the maps directly.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.write().schema_ready = true;
        Ok(())
    }

    async fn upsert_nodes(&self, batch: &[TransactionRecord]) -> Result<Vec<UpsertOutcome>> {
        let mut inner = self.write();
        let mut outcomes = Vec::with_capacity(batch.len());
        for record in batch {
            if inner.nodes.contains_key(&record.tx_id) {
                outcomes.push(UpsertOutcome::Unchanged);
            } else {
                inner.nodes.insert(record.tx_id.clone(), record.clone());
                outcomes.push(UpsertOutcome::Inserted);
            }
        }
        Ok(outcomes)
    }

    async fn upsert_edges(&self, batch: &[EdgeRecord]) -> Result<Vec<UpsertOutcome>> {
        let mut inner = self.write();
        let mut outcomes = Vec::with_capacity(batch.len());
        for edge in batch {
            let endpoints_present = [&edge.from_tx, &edge.to_tx].iter().all(|id| {
                inner
                    .nodes
                    .get(id)
                    .is_some_and(|n| n.time_step <= edge.time_step)
            });
            if !endpoints_present {
                outcomes.push(UpsertOutcome::SkippedMissingEndpoint);
                continue;
            }
            if inner.edges.insert(edge.clone()) {
                outcomes.push(UpsertOutcome::Inserted);
            } else {
                outcomes.push(UpsertOutcome::Unchanged);
            }
        }
        Ok(outcomes)
    }

    async fn run_query(
        &self,
        descriptor: &QueryDescriptor,
        params: &QueryParams,
    ) -> Result<Vec<Row>> {
        descriptor.check_params(params)?;
        let inner = self.read();
        match descriptor.name {
            "count-by-class" => Ok(count_by_class(&inner)),
            "outgoing-edges" => Ok(adjacent_edges(&inner, param_str(params, "tx_id")?, true)),
            "incoming-edges" => Ok(adjacent_edges(&inner, param_str(params, "tx_id")?, false)),
            "time-range" => Ok(time_range(
                &inner,
                param_step(params, "start")?,
                param_step(params, "end")?,
            )),
            "edge-count" => Ok(vec![row([("count", (inner.edges.len() as i64).into())])]),
            "edge-list" => Ok(edge_list(&inner)),
            "avg-step-by-class" => Ok(avg_step_by_class(&inner)),
            "two-hop-neighbors" => Ok(two_hop(&inner, param_str(params, "tx_id")?)),
            "hub-detection" => Ok(hubs(&inner, param_i64(params, "threshold")?)),
            "temporal-pattern" => Ok(temporal_pattern(
                &inner,
                param_step(params, "start")?,
                param_step(params, "end")?,
            )),
            "illicit-subgraph-nodes" => Ok(illicit_nodes(&inner)),
            "illicit-subgraph-edges" => Ok(illicit_edges(&inner)),
            other => Err(StoreError::Query(format!(
                "memory backend does not implement query `{other}`"
            ))),
        }
    }

    async fn node_exists(&self, tx_id: &TxId) -> Result<bool> {
        Ok(self.read().nodes.contains_key(tx_id))
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let inner = self.read();
        Ok(StoreCounts {
            nodes: inner.nodes.len() as u64,
            edges: inner.edges.len() as u64,
        })
    }
}

// ── Query implementations ─────────────────────────────────────────

fn row<const N: usize>(cols: [(&str, serde_json::Value); N]) -> Row {
    let mut out = Row::new();
    for (name, value) in cols {
        out.insert(name.to_string(), value);
    }
    out
}

fn param_str(params: &QueryParams, name: &str) -> Result<String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Query(format!("missing text parameter `{name}`")))
}

fn param_i64(params: &QueryParams, name: &str) -> Result<i64> {
    params
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| StoreError::Query(format!("missing integer parameter `{name}`")))
}

fn param_step(params: &QueryParams, name: &str) -> Result<TimeStep> {
    let v = param_i64(params, name)?;
    u32::try_from(v).map_err(|_| StoreError::Query(format!("parameter `{name}` out of range")))
}

fn count_by_class(inner: &Inner) -> Vec<Row> {
    // Lexicographic label order matches `ORDER BY class_label`.
    let mut counts: BTreeMap<&'static str, i64> = BTreeMap::new();
    for node in inner.nodes.values() {
        *counts.entry(node.class_label.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| row([("class_label", label.into()), ("count", count.into())]))
        .collect()
}

fn adjacent_edges(inner: &Inner, tx_id: String, outgoing: bool) -> Vec<Row> {
    let mut edges: Vec<&EdgeRecord> = inner
        .edges
        .iter()
        .filter(|e| {
            if outgoing {
                e.from_tx.as_str() == tx_id
            } else {
                e.to_tx.as_str() == tx_id
            }
        })
        .collect();
    if outgoing {
        edges.sort_by(|a, b| (&a.to_tx, a.time_step).cmp(&(&b.to_tx, b.time_step)));
    } else {
        edges.sort_by(|a, b| (&a.from_tx, a.time_step).cmp(&(&b.from_tx, b.time_step)));
    }
    edges
        .into_iter()
        .map(|e| {
            row([
                ("from_tx", e.from_tx.as_str().into()),
                ("to_tx", e.to_tx.as_str().into()),
                ("time_step", i64::from(e.time_step).into()),
            ])
        })
        .collect()
}

fn time_range(inner: &Inner, start: TimeStep, end: TimeStep) -> Vec<Row> {
    let mut nodes: Vec<&TransactionRecord> = inner
        .nodes
        .values()
        .filter(|n| n.time_step >= start && n.time_step <= end)
        .collect();
    nodes.sort_by(|a, b| (a.time_step, &a.tx_id).cmp(&(b.time_step, &b.tx_id)));
    nodes
        .into_iter()
        .map(|n| {
            row([
                ("tx_id", n.tx_id.as_str().into()),
                ("class_label", n.class_label.as_str().into()),
                ("time_step", i64::from(n.time_step).into()),
            ])
        })
        .collect()
}

fn edge_list(inner: &Inner) -> Vec<Row> {
    // BTreeSet iteration is already (from, to, step) ascending.
    inner
        .edges
        .iter()
        .map(|e| {
            row([
                ("from_tx", e.from_tx.as_str().into()),
                ("to_tx", e.to_tx.as_str().into()),
            ])
        })
        .collect()
}

fn avg_step_by_class(inner: &Inner) -> Vec<Row> {
    let mut sums: BTreeMap<&'static str, (i64, i64)> = BTreeMap::new();
    for node in inner.nodes.values() {
        let entry = sums.entry(node.class_label.as_str()).or_insert((0, 0));
        entry.0 += i64::from(node.time_step);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(label, (sum, count))| {
            row([
                ("class_label", label.into()),
                ("avg_time_step", (sum as f64 / count as f64).into()),
                ("count", count.into()),
            ])
        })
        .collect()
}

fn two_hop(inner: &Inner, tx_id: String) -> Vec<Row> {
    let first: BTreeSet<&TxId> = inner
        .edges
        .iter()
        .filter(|e| e.from_tx.as_str() == tx_id)
        .map(|e| &e.to_tx)
        .collect();
    let second: BTreeSet<&TxId> = inner
        .edges
        .iter()
        .filter(|e| first.contains(&e.from_tx))
        .map(|e| &e.to_tx)
        .filter(|id| id.as_str() != tx_id)
        .collect();
    second
        .into_iter()
        .map(|id| row([("tx_id", id.as_str().into())]))
        .collect()
}

fn hubs(inner: &Inner, threshold: i64) -> Vec<Row> {
    let mut in_degree: BTreeMap<&TxId, i64> = BTreeMap::new();
    let mut out_degree: BTreeMap<&TxId, i64> = BTreeMap::new();
    for edge in &inner.edges {
        *out_degree.entry(&edge.from_tx).or_insert(0) += 1;
        *in_degree.entry(&edge.to_tx).or_insert(0) += 1;
    }

    let mut rows: Vec<(i64, &TransactionRecord, i64, i64)> = inner
        .nodes
        .values()
        .map(|n| {
            let inc = in_degree.get(&n.tx_id).copied().unwrap_or(0);
            let out = out_degree.get(&n.tx_id).copied().unwrap_or(0);
            (inc + out, n, inc, out)
        })
        .filter(|(degree, ..)| *degree >= threshold)
        .collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.tx_id.cmp(&b.1.tx_id)));

    rows.into_iter()
        .map(|(degree, node, inc, out)| {
            row([
                ("tx_id", node.tx_id.as_str().into()),
                ("class_label", node.class_label.as_str().into()),
                ("in_degree", inc.into()),
                ("out_degree", out.into()),
                ("degree", degree.into()),
            ])
        })
        .collect()
}

fn temporal_pattern(inner: &Inner, start: TimeStep, end: TimeStep) -> Vec<Row> {
    let mut steps: BTreeMap<TimeStep, (i64, i64, i64)> = BTreeMap::new();
    for node in inner.nodes.values() {
        if node.time_step < start || node.time_step > end {
            continue;
        }
        let entry = steps.entry(node.time_step).or_insert((0, 0, 0));
        match node.class_label {
            ClassLabel::Illicit => entry.0 += 1,
            ClassLabel::Licit => entry.1 += 1,
            ClassLabel::Unknown => entry.2 += 1,
        }
    }
    steps
        .into_iter()
        .map(|(step, (illicit, licit, unknown))| {
            row([
                ("time_step", i64::from(step).into()),
                ("illicit", illicit.into()),
                ("licit", licit.into()),
                ("unknown", unknown.into()),
            ])
        })
        .collect()
}

fn illicit_nodes(inner: &Inner) -> Vec<Row> {
    inner
        .nodes
        .values()
        .filter(|n| n.class_label == ClassLabel::Illicit)
        .map(|n| row([("tx_id", n.tx_id.as_str().into())]))
        .collect()
}

fn illicit_edges(inner: &Inner) -> Vec<Row> {
    let is_illicit = |id: &TxId| {
        inner
            .nodes
            .get(id)
            .is_some_and(|n| n.class_label == ClassLabel::Illicit)
    };
    inner
        .edges
        .iter()
        .filter(|e| is_illicit(&e.from_tx) && is_illicit(&e.to_tx))
        .map(|e| {
            row([
                ("from_tx", e.from_tx.as_str().into()),
                ("to_tx", e.to_tx.as_str().into()),
            ])
        })
        .collect()
}
