//! Error types for the txlens-ingest crate.

use thiserror::Error;

use txlens_core::TimeStep;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Graph store error: {0}")]
    Store(#[from] txlens_graph::StoreError),

    #[error("Step {step} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        step: TimeStep,
        attempts: u32,
        reason: String,
    },

    #[error("Invalid record: {0}")]
    Validation(#[from] txlens_core::ValidationError),

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
