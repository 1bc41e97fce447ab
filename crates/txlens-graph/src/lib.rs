//! txlens-graph — graph store capability interface and its backends.
//!
//! All transaction-graph reads and writes flow through the [`GraphStore`]
//! trait: a batch upsert + declarative read-query contract that any
//! graph-capable backend can implement. Two backends ship here:
//! the Neo4j backend used in production and an in-memory backend for
//! deterministic tests and offline runs.

pub mod client;
pub mod memory;
pub mod neo4j;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphConfig};
pub use memory::MemoryStore;
pub use neo4j::Neo4jStore;
pub use store::{
    ColumnKind, ColumnSpec, GraphStore, ParamKind, ParamSpec, QueryDescriptor, QueryParams, Row,
    StoreCounts, StoreError, UpsertOutcome,
};
