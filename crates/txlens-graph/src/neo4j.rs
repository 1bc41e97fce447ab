//! Neo4j-backed [`GraphStore`] implementation.
//!
//! Nodes are `(:Transaction {tx_id, class_label, time_step, features})`,
//! edges `-[:SENDS {time_step}]->`. All writes use MERGE keyed on the
//! document identity, so replaying a batch is an idempotent no-op.

use async_trait::async_trait;
use neo4rs::{query, Query};

use txlens_core::{EdgeRecord, TransactionRecord, TxId};

use crate::client::{GraphClient, GraphConfig};
use crate::store::{
    ColumnKind, GraphStore, QueryDescriptor, QueryParams, Result, Row, StoreCounts, StoreError,
    UpsertOutcome,
};

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT tx_id_unique IF NOT EXISTS
     FOR (t:Transaction) REQUIRE t.tx_id IS UNIQUE",
    "CREATE INDEX tx_time_step IF NOT EXISTS
     FOR (t:Transaction) ON (t.time_step)",
    "CREATE INDEX tx_class_label IF NOT EXISTS
     FOR (t:Transaction) ON (t.class_label)",
];

const UPSERT_NODE: &str = "MERGE (t:Transaction {tx_id: $tx_id})
 ON CREATE SET
   t.class_label = $class_label, t.time_step = $time_step,
   t.features = $features, t._created = true
 WITH t, coalesce(t._created, false) AS created
 REMOVE t._created
 RETURN created";

// The WHERE clause enforces that an edge never references a node first
// appearing at a later step; such edges fall out as skipped, not stored.
const UPSERT_EDGE: &str = "MATCH (a:Transaction {tx_id: $from_tx})
 MATCH (b:Transaction {tx_id: $to_tx})
 WHERE a.time_step <= $time_step AND b.time_step <= $time_step
 MERGE (a)-[r:SENDS {time_step: $time_step}]->(b)
 ON CREATE SET r._created = true
 WITH r, coalesce(r._created, false) AS created
 REMOVE r._created
 RETURN created";

/// Production [`GraphStore`] backend on top of Neo4j.
#[derive(Clone)]
pub struct Neo4jStore {
    client: GraphClient,
}

impl Neo4jStore {
    /// Connect and wrap a pooled client.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let client = GraphClient::connect(config).await?;
        Ok(Self { client })
    }

    pub fn from_client(client: GraphClient) -> Self {
        Self { client }
    }

    /// Run one MERGE and classify the outcome from its `created` flag.
    ///
    /// Transport and connection errors abort the batch with `Err` so the
    /// caller's retry path sees them; only a malformed result row is a
    /// per-document failure.
    async fn merge_outcome(&self, q: Query, skippable: bool) -> Result<UpsertOutcome> {
        match self.client.query_one(q).await? {
            Some(row) => Ok(match row.get::<bool>("created") {
                Ok(true) => UpsertOutcome::Inserted,
                Ok(false) => UpsertOutcome::Unchanged,
                Err(e) => UpsertOutcome::Failed(e.to_string()),
            }),
            None if skippable => Ok(UpsertOutcome::SkippedMissingEndpoint),
            None => Ok(UpsertOutcome::Failed("merge returned no row".to_string())),
        }
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA_STATEMENTS {
            self.client
                .run(query(statement))
                .await
                .map_err(|e| StoreError::Schema(e.to_string()))?;
        }
        tracing::info!("Transaction graph schema ensured");
        Ok(())
    }

    async fn upsert_nodes(&self, batch: &[TransactionRecord]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for record in batch {
            let q = query(UPSERT_NODE)
                .param("tx_id", record.tx_id.as_str())
                .param("class_label", record.class_label.as_str())
                .param("time_step", record.time_step as i64)
                .param("features", record.features.as_slice().to_vec());

            let outcome = self.merge_outcome(q, false).await?;
            if let UpsertOutcome::Failed(reason) = &outcome {
                tracing::warn!(tx_id = %record.tx_id, %reason, "Node upsert failed");
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn upsert_edges(&self, batch: &[EdgeRecord]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for edge in batch {
            let q = query(UPSERT_EDGE)
                .param("from_tx", edge.from_tx.as_str())
                .param("to_tx", edge.to_tx.as_str())
                .param("time_step", edge.time_step as i64);

            let outcome = self.merge_outcome(q, true).await?;
            match &outcome {
                UpsertOutcome::SkippedMissingEndpoint => {
                    tracing::debug!(
                        from = %edge.from_tx, to = %edge.to_tx, step = edge.time_step,
                        "Edge skipped: endpoint not ingested"
                    );
                }
                UpsertOutcome::Failed(reason) => {
                    tracing::warn!(from = %edge.from_tx, to = %edge.to_tx, %reason, "Edge upsert failed");
                }
                _ => {}
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn run_query(
        &self,
        descriptor: &QueryDescriptor,
        params: &QueryParams,
    ) -> Result<Vec<Row>> {
        descriptor.check_params(params)?;

        let mut q = query(descriptor.cypher);
        for (name, value) in params {
            q = bind_param(q, name, value)?;
        }

        let rows = self.client.query_rows(q).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(convert_row(&row, descriptor));
        }
        Ok(out)
    }

    async fn node_exists(&self, tx_id: &TxId) -> Result<bool> {
        let q = query("MATCH (t:Transaction {tx_id: $tx_id}) RETURN t.tx_id AS tx_id LIMIT 1")
            .param("tx_id", tx_id.as_str());
        Ok(self.client.query_one(q).await?.is_some())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let nodes = match self
            .client
            .query_one(query("MATCH (t:Transaction) RETURN count(t) AS cnt"))
            .await?
        {
            Some(row) => row.get::<i64>("cnt").unwrap_or(0),
            None => 0,
        };
        let edges = match self
            .client
            .query_one(query("MATCH ()-[r:SENDS]->() RETURN count(r) AS cnt"))
            .await?
        {
            Some(row) => row.get::<i64>("cnt").unwrap_or(0),
            None => 0,
        };
        Ok(StoreCounts {
            nodes: nodes.max(0) as u64,
            edges: edges.max(0) as u64,
        })
    }
}

/// Bind a JSON parameter value onto a neo4rs query.
fn bind_param(q: Query, name: &str, value: &serde_json::Value) -> Result<Query> {
    match value {
        serde_json::Value::String(s) => Ok(q.param(name, s.clone())),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
            let v = n
                .as_i64()
                .ok_or_else(|| StoreError::Query(format!("parameter `{name}` out of range")))?;
            Ok(q.param(name, v))
        }
        serde_json::Value::Number(n) => Ok(q.param(name, n.as_f64().unwrap_or(0.0))),
        serde_json::Value::Bool(b) => Ok(q.param(name, *b)),
        other => Err(StoreError::Query(format!(
            "unsupported parameter type for `{name}`: {other}"
        ))),
    }
}

/// Convert a neo4rs row into the wire row shape declared by the descriptor.
fn convert_row(row: &neo4rs::Row, descriptor: &QueryDescriptor) -> Row {
    let mut out = Row::new();
    for column in descriptor.columns {
        let value = match column.kind {
            ColumnKind::Text => row
                .get::<String>(column.name)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
            ColumnKind::Integer => row
                .get::<i64>(column.name)
                .map(serde_json::Value::from)
                .unwrap_or(serde_json::Value::Null),
            ColumnKind::Float => row
                .get::<f64>(column.name)
                .map(serde_json::Value::from)
                .unwrap_or(serde_json::Value::Null),
        };
        out.insert(column.name.to_string(), value);
    }
    out
}
