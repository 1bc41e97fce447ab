//! txlens-query — named queries and result caching for the transaction graph.
//!
//! The catalog validates parameters against each query's declared
//! schema and semantic rules before touching the store, runs under a
//! bounded concurrency budget, and composes the illicit-cluster and
//! shortest-paths queries from store fetches plus client-side graph
//! algorithms. The
//! cache keys results on `(query, params, dataset version)` so a
//! version bump from ingestion invalidates everything implicitly.

pub mod cache;
pub mod catalog;
pub mod components;
pub mod error;
pub mod paths;

pub use cache::{CachedCatalog, DatasetVersion, PinnedVersion, ResultCache};
pub use catalog::{QueryCatalog, ILLICIT_CLUSTERS, SHORTEST_PATHS};
pub use components::{connected_components, Cluster};
pub use error::{QueryError, Result};
pub use paths::{k_shortest_paths, PathHit};
