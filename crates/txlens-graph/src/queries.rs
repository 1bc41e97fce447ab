//! The named read queries of the transaction graph wire contract.
//!
//! Every descriptor here is read-only. The Cypher bodies are what the
//! Neo4j backend executes; the in-memory backend reimplements the same
//! semantics keyed on `name`, with identical column shapes and ordering.

use crate::store::{ColumnKind, ColumnSpec, ParamKind, ParamSpec, QueryDescriptor};

const TX_ID: ParamSpec = ParamSpec {
    name: "tx_id",
    kind: ParamKind::Text,
    required: true,
};

const START: ParamSpec = ParamSpec {
    name: "start",
    kind: ParamKind::Integer,
    required: true,
};

const END: ParamSpec = ParamSpec {
    name: "end",
    kind: ParamKind::Integer,
    required: true,
};

const fn text(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Text,
    }
}

const fn int(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Integer,
    }
}

const fn float(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        kind: ColumnKind::Float,
    }
}

// ── Simple queries ────────────────────────────────────────────────

pub const COUNT_BY_CLASS: QueryDescriptor = QueryDescriptor {
    name: "count-by-class",
    cypher: "MATCH (t:Transaction)
 RETURN t.class_label AS class_label, count(t) AS count
 ORDER BY class_label",
    params: &[],
    columns: &[text("class_label"), int("count")],
};

pub const OUTGOING_EDGES: QueryDescriptor = QueryDescriptor {
    name: "outgoing-edges",
    cypher: "MATCH (a:Transaction {tx_id: $tx_id})-[r:SENDS]->(b:Transaction)
 RETURN a.tx_id AS from_tx, b.tx_id AS to_tx, r.time_step AS time_step
 ORDER BY to_tx, time_step",
    params: &[TX_ID],
    columns: &[text("from_tx"), text("to_tx"), int("time_step")],
};

pub const INCOMING_EDGES: QueryDescriptor = QueryDescriptor {
    name: "incoming-edges",
    cypher: "MATCH (a:Transaction)-[r:SENDS]->(b:Transaction {tx_id: $tx_id})
 RETURN a.tx_id AS from_tx, b.tx_id AS to_tx, r.time_step AS time_step
 ORDER BY from_tx, time_step",
    params: &[TX_ID],
    columns: &[text("from_tx"), text("to_tx"), int("time_step")],
};

pub const TIME_RANGE: QueryDescriptor = QueryDescriptor {
    name: "time-range",
    cypher: "MATCH (t:Transaction)
 WHERE t.time_step >= $start AND t.time_step <= $end
 RETURN t.tx_id AS tx_id, t.class_label AS class_label, t.time_step AS time_step
 ORDER BY time_step, tx_id",
    params: &[START, END],
    columns: &[text("tx_id"), text("class_label"), int("time_step")],
};

pub const EDGE_COUNT: QueryDescriptor = QueryDescriptor {
    name: "edge-count",
    cypher: "MATCH ()-[r:SENDS]->() RETURN count(r) AS count",
    params: &[],
    columns: &[int("count")],
};

/// Full directed edge list; the shortest-path computation builds its
/// adjacency from these rows client-side.
pub const EDGE_LIST: QueryDescriptor = QueryDescriptor {
    name: "edge-list",
    cypher: "MATCH (a:Transaction)-[r:SENDS]->(b:Transaction)
 RETURN a.tx_id AS from_tx, b.tx_id AS to_tx
 ORDER BY from_tx, to_tx",
    params: &[],
    columns: &[text("from_tx"), text("to_tx")],
};

pub const AVG_STEP_BY_CLASS: QueryDescriptor = QueryDescriptor {
    name: "avg-step-by-class",
    cypher: "MATCH (t:Transaction)
 RETURN t.class_label AS class_label,
        avg(t.time_step) AS avg_time_step,
        count(t) AS count
 ORDER BY class_label",
    params: &[],
    columns: &[text("class_label"), float("avg_time_step"), int("count")],
};

// ── Complex queries ───────────────────────────────────────────────

/// Nodes reachable by exactly two directed hops, deduplicated, origin
/// excluded.
pub const TWO_HOP_NEIGHBORS: QueryDescriptor = QueryDescriptor {
    name: "two-hop-neighbors",
    cypher: "MATCH (a:Transaction {tx_id: $tx_id})-[:SENDS]->()-[:SENDS]->(b:Transaction)
 WHERE b.tx_id <> $tx_id
 RETURN DISTINCT b.tx_id AS tx_id
 ORDER BY tx_id",
    params: &[TX_ID],
    columns: &[text("tx_id")],
};

pub const HUB_DETECTION: QueryDescriptor = QueryDescriptor {
    name: "hub-detection",
    cypher: "MATCH (t:Transaction)
 OPTIONAL MATCH (t)-[out:SENDS]->()
 WITH t, count(out) AS out_degree
 OPTIONAL MATCH ()-[inc:SENDS]->(t)
 WITH t, out_degree, count(inc) AS in_degree
 WITH t, in_degree, out_degree, in_degree + out_degree AS degree
 WHERE degree >= $threshold
 RETURN t.tx_id AS tx_id, t.class_label AS class_label,
        in_degree, out_degree, degree
 ORDER BY degree DESC, tx_id",
    params: &[ParamSpec {
        name: "threshold",
        kind: ParamKind::Integer,
        required: true,
    }],
    columns: &[
        text("tx_id"),
        text("class_label"),
        int("in_degree"),
        int("out_degree"),
        int("degree"),
    ],
};

pub const TEMPORAL_PATTERN: QueryDescriptor = QueryDescriptor {
    name: "temporal-pattern",
    cypher: "MATCH (t:Transaction)
 WHERE t.time_step >= $start AND t.time_step <= $end
 RETURN t.time_step AS time_step,
        sum(CASE WHEN t.class_label = 'illicit' THEN 1 ELSE 0 END) AS illicit,
        sum(CASE WHEN t.class_label = 'licit' THEN 1 ELSE 0 END) AS licit,
        sum(CASE WHEN t.class_label = 'unknown' THEN 1 ELSE 0 END) AS unknown
 ORDER BY time_step",
    params: &[START, END],
    columns: &[
        int("time_step"),
        int("illicit"),
        int("licit"),
        int("unknown"),
    ],
};

/// Building blocks for illicit-cluster detection: the induced subgraph
/// on illicit nodes is fetched with these two descriptors and the
/// components are computed client-side.
pub const ILLICIT_SUBGRAPH_NODES: QueryDescriptor = QueryDescriptor {
    name: "illicit-subgraph-nodes",
    cypher: "MATCH (t:Transaction {class_label: 'illicit'})
 RETURN t.tx_id AS tx_id
 ORDER BY tx_id",
    params: &[],
    columns: &[text("tx_id")],
};

pub const ILLICIT_SUBGRAPH_EDGES: QueryDescriptor = QueryDescriptor {
    name: "illicit-subgraph-edges",
    cypher: "MATCH (a:Transaction {class_label: 'illicit'})-[:SENDS]->(b:Transaction {class_label: 'illicit'})
 RETURN a.tx_id AS from_tx, b.tx_id AS to_tx
 ORDER BY from_tx, to_tx",
    params: &[],
    columns: &[text("from_tx"), text("to_tx")],
};

/// Every descriptor in the wire contract.
pub const ALL: &[&QueryDescriptor] = &[
    &COUNT_BY_CLASS,
    &OUTGOING_EDGES,
    &INCOMING_EDGES,
    &TIME_RANGE,
    &EDGE_COUNT,
    &EDGE_LIST,
    &AVG_STEP_BY_CLASS,
    &TWO_HOP_NEIGHBORS,
    &HUB_DETECTION,
    &TEMPORAL_PATTERN,
    &ILLICIT_SUBGRAPH_NODES,
    &ILLICIT_SUBGRAPH_EDGES,
];

/// Look up a descriptor by its wire name.
pub fn find(name: &str) -> Option<&'static QueryDescriptor> {
    ALL.iter().copied().find(|d| d.name == name)
}
