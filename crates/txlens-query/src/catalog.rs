//! The named query catalog.
//!
//! Validates parameters against each query's declared schema plus its
//! semantic rules, then executes against the graph store under a
//! bounded concurrency budget. Two composite queries are computed
//! client-side from subgraph fetches: `illicit-clusters` (connected
//! components) and `shortest-paths` (hop-weighted k-shortest).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;

use txlens_core::{TimeStep, TxId, MAX_TIME_STEP};
use txlens_graph::{queries, GraphStore, QueryParams, Row, StoreError};

use crate::components::connected_components;
use crate::error::{QueryError, Result};
use crate::paths::k_shortest_paths;

/// Wire name of the composite cluster query.
pub const ILLICIT_CLUSTERS: &str = "illicit-clusters";

/// Wire name of the composite shortest-path query.
pub const SHORTEST_PATHS: &str = "shortest-paths";

const DEFAULT_MIN_CLUSTER_SIZE: i64 = 2;
const SHORTEST_PATH_LIMIT: usize = 3;
const SHORTEST_PATH_MAX_HOPS: usize = 10;

/// Executes named queries with validation and bounded concurrency.
pub struct QueryCatalog {
    store: Arc<dyn GraphStore>,
    permits: Arc<Semaphore>,
}

impl QueryCatalog {
    pub fn new(store: Arc<dyn GraphStore>, max_concurrent: usize) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Every query name the catalog answers to.
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = queries::ALL.iter().map(|d| d.name).collect();
        names.push(ILLICIT_CLUSTERS);
        names.push(SHORTEST_PATHS);
        names.sort();
        names
    }

    /// Validate and execute the named query.
    ///
    /// Every store read, the existence checks included, runs under the
    /// concurrency budget; only pure parameter checks happen outside it.
    pub async fn run(&self, name: &str, params: QueryParams) -> Result<Vec<Row>> {
        if name == ILLICIT_CLUSTERS {
            let min_size = validate_cluster_params(&params)?;
            let _permit = self.permits.acquire().await.expect("Semaphore closed");
            return self.illicit_clusters(min_size).await;
        }
        if name == SHORTEST_PATHS {
            let (from, to) = validate_path_params(&params)?;
            let _permit = self.permits.acquire().await.expect("Semaphore closed");
            return self.shortest_paths(from, to).await;
        }

        let descriptor = queries::find(name)
            .ok_or_else(|| QueryError::UnknownQuery(name.to_string()))?;
        descriptor.check_params(&params).map_err(schema_error)?;

        let _permit = self.permits.acquire().await.expect("Semaphore closed");
        self.check_semantics(name, &params).await?;
        let rows = self.store.run_query(descriptor, &params).await?;
        tracing::debug!(query = name, rows = rows.len(), "Query executed");
        Ok(rows)
    }

    /// Rules the declared parameter schema cannot express.
    async fn check_semantics(&self, name: &str, params: &QueryParams) -> Result<()> {
        match name {
            "time-range" | "temporal-pattern" => {
                let start = step_param(params, "start")?;
                let end = step_param(params, "end")?;
                if start > end {
                    return Err(QueryError::EmptyWindow { start, end });
                }
            }
            "hub-detection" => {
                let threshold = int_param(params, "threshold")?;
                if threshold < 1 {
                    return Err(QueryError::InvalidParam(format!(
                        "threshold must be at least 1, got {threshold}"
                    )));
                }
            }
            "outgoing-edges" | "incoming-edges" | "two-hop-neighbors" => {
                let tx_id = text_param(params, "tx_id")?;
                let tx_id = TxId::new(tx_id);
                if !self.store.node_exists(&tx_id).await? {
                    return Err(QueryError::UnknownTx(tx_id));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Connected components over the illicit-induced subgraph, filtered
    /// to components of at least `min_size` members.
    async fn illicit_clusters(&self, min_size: i64) -> Result<Vec<Row>> {
        let empty = QueryParams::new();
        let node_rows = self
            .store
            .run_query(&queries::ILLICIT_SUBGRAPH_NODES, &empty)
            .await?;
        let edge_rows = self
            .store
            .run_query(&queries::ILLICIT_SUBGRAPH_EDGES, &empty)
            .await?;

        let nodes: Vec<String> = node_rows
            .iter()
            .filter_map(|r| r.get("tx_id").and_then(|v| v.as_str()).map(String::from))
            .collect();
        let edges: Vec<(String, String)> = edge_rows
            .iter()
            .filter_map(|r| {
                let from = r.get("from_tx").and_then(|v| v.as_str())?;
                let to = r.get("to_tx").and_then(|v| v.as_str())?;
                Some((from.to_string(), to.to_string()))
            })
            .collect();

        let rows: Vec<Row> = connected_components(&nodes, &edges)
            .into_iter()
            .filter(|c| c.size() as i64 >= min_size)
            .map(|c| {
                let mut row = Row::new();
                row.insert("size".to_string(), json!(c.size()));
                row.insert("members".to_string(), json!(c.members));
                row
            })
            .collect();
        tracing::debug!(clusters = rows.len(), min_size, "Cluster query executed");
        Ok(rows)
    }

    /// Up to three hop-shortest directed paths between two known
    /// transactions, with the class label of every node on the path.
    async fn shortest_paths(&self, from: TxId, to: TxId) -> Result<Vec<Row>> {
        for tx_id in [&from, &to] {
            if !self.store.node_exists(tx_id).await? {
                return Err(QueryError::UnknownTx(tx_id.clone()));
            }
        }

        let empty = QueryParams::new();
        let edge_rows = self.store.run_query(&queries::EDGE_LIST, &empty).await?;
        let edges: Vec<(String, String)> = edge_rows
            .iter()
            .filter_map(|r| {
                let a = r.get("from_tx").and_then(|v| v.as_str())?;
                let b = r.get("to_tx").and_then(|v| v.as_str())?;
                Some((a.to_string(), b.to_string()))
            })
            .collect();

        let mut window = QueryParams::new();
        window.insert("start".into(), json!(1));
        window.insert("end".into(), json!(MAX_TIME_STEP));
        let node_rows = self.store.run_query(&queries::TIME_RANGE, &window).await?;
        let classes: HashMap<&str, &str> = node_rows
            .iter()
            .filter_map(|r| {
                let id = r.get("tx_id").and_then(|v| v.as_str())?;
                let class = r.get("class_label").and_then(|v| v.as_str())?;
                Some((id, class))
            })
            .collect();

        let rows: Vec<Row> = k_shortest_paths(
            &edges,
            from.as_str(),
            to.as_str(),
            SHORTEST_PATH_LIMIT,
            SHORTEST_PATH_MAX_HOPS,
        )
        .into_iter()
        .map(|hit| {
            let path_classes: Vec<&str> = hit
                .nodes
                .iter()
                .map(|id| classes.get(id.as_str()).copied().unwrap_or("unknown"))
                .collect();
            let mut row = Row::new();
            row.insert("hops".to_string(), json!(hit.hops));
            row.insert("path".to_string(), json!(hit.nodes));
            row.insert("classes".to_string(), json!(path_classes));
            row
        })
        .collect();
        tracing::debug!(paths = rows.len(), from = %from, to = %to, "Path query executed");
        Ok(rows)
    }
}

fn validate_cluster_params(params: &QueryParams) -> Result<i64> {
    for name in params.keys() {
        if name != "min_size" {
            return Err(QueryError::InvalidParam(format!(
                "unexpected parameter `{name}` for query `{ILLICIT_CLUSTERS}`"
            )));
        }
    }
    let min_size = match params.get("min_size") {
        None => DEFAULT_MIN_CLUSTER_SIZE,
        Some(value) => value.as_i64().ok_or_else(|| {
            QueryError::InvalidParam("min_size must be an integer".to_string())
        })?,
    };
    if min_size < 1 {
        return Err(QueryError::InvalidParam(format!(
            "min_size must be at least 1, got {min_size}"
        )));
    }
    Ok(min_size)
}

fn validate_path_params(params: &QueryParams) -> Result<(TxId, TxId)> {
    for name in params.keys() {
        if name != "from_tx" && name != "to_tx" {
            return Err(QueryError::InvalidParam(format!(
                "unexpected parameter `{name}` for query `{SHORTEST_PATHS}`"
            )));
        }
    }
    let from = text_param(params, "from_tx")?;
    let to = text_param(params, "to_tx")?;
    Ok((TxId::new(from), TxId::new(to)))
}

fn schema_error(e: StoreError) -> QueryError {
    match e {
        StoreError::Query(msg) => QueryError::InvalidParam(msg),
        other => QueryError::Store(other),
    }
}

fn int_param(params: &QueryParams, name: &str) -> Result<i64> {
    params
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| QueryError::InvalidParam(format!("`{name}` must be an integer")))
}

fn step_param(params: &QueryParams, name: &str) -> Result<TimeStep> {
    let value = int_param(params, name)?;
    if value < 1 || value > i64::from(MAX_TIME_STEP) {
        return Err(QueryError::InvalidParam(format!(
            "`{name}` must be within 1..={MAX_TIME_STEP}, got {value}"
        )));
    }
    Ok(value as TimeStep)
}

fn text_param(params: &QueryParams, name: &str) -> Result<String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| QueryError::InvalidParam(format!("`{name}` must be a string")))
}
