//! Error types for the txlens-query crate.

use thiserror::Error;

use txlens_core::{TimeStep, TxId};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Empty time window: start {start} is after end {end}")]
    EmptyWindow { start: TimeStep, end: TimeStep },

    #[error("Unknown transaction: {0}")]
    UnknownTx(TxId),

    #[error("Graph store error: {0}")]
    Store(#[from] txlens_graph::StoreError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
