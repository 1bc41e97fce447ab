//! txlens-core: Shared types and validation for the txlens transaction graph.
//!
//! This crate provides the foundational types used across all txlens
//! components:
//! - Transaction and edge records as produced by the preprocessing stage
//! - Class labels and the fixed-dimension feature vector
//! - Record validation and the `ValidationError` type

pub mod error;
pub mod types;

pub use error::ValidationError;
pub use types::{
    ClassLabel, EdgeRecord, FeatureVector, TimeStep, TransactionRecord, TxId, FEATURE_DIM,
    MAX_TIME_STEP,
};
