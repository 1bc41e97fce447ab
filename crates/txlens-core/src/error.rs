use thiserror::Error;

/// Record-level validation failures.
///
/// Raised before batching; a record that fails validation never reaches
/// the graph store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Transaction id must not be empty")]
    EmptyTxId,

    #[error("Time step {0} outside valid range 1..={max}", max = crate::MAX_TIME_STEP)]
    TimeStepOutOfRange(u32),

    #[error("Feature vector has {got} values, expected {expected}", expected = crate::FEATURE_DIM)]
    FeatureLength { got: usize },

    #[error("Unknown class code: {0}")]
    UnknownClassCode(i64),
}
