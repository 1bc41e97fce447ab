//! txlens-ingest — streaming time-ordered ingestion for the transaction graph.
//!
//! Replays validated transaction and edge records into the graph store
//! one time step at a time: all nodes of a step, then all edges of the
//! step, then a checkpoint advance and a simulated-cadence delay. Runs
//! are resumable from the persisted checkpoint and cancellable at step
//! boundaries.

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingestor;
pub mod source;
pub mod supervisor;

pub use checkpoint::{CheckpointStore, IngestionCheckpoint};
pub use clock::{Clock, NoopClock, TokioClock};
pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use ingestor::{IngestStats, RunOutcome, StatsSnapshot, StreamingIngestor};
pub use source::{load_edges, load_transactions, SourceError};
pub use supervisor::{IngestionSupervisor, RunState};

#[cfg(test)]
pub(crate) mod testutil;
