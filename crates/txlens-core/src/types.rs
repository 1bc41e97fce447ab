//! Core domain types for the txlens transaction graph.
//!
//! These types represent the validated records handed over by the
//! preprocessing stage: labeled transactions with a fixed-dimension
//! feature vector, and directed payment edges between them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of numeric features carried by every transaction.
pub const FEATURE_DIM: usize = 166;

/// Highest valid time step in the dataset (steps are 1-based).
pub const MAX_TIME_STEP: u32 = 49;

/// Discrete chronological bucket grouping transactions for ordered replay.
pub type TimeStep = u32;

// ── Identifiers ───────────────────────────────────────────────────

/// Unique, immutable identifier of a transaction node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Class labels ──────────────────────────────────────────────────

/// Ground-truth label of a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClassLabel {
    Unknown,
    Licit,
    Illicit,
}

impl ClassLabel {
    /// Map the dataset's numeric class code (0 = unknown, 1 = licit,
    /// 2 = illicit) to a label.
    pub fn from_code(code: i64) -> Result<Self, ValidationError> {
        match code {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Licit),
            2 => Ok(Self::Illicit),
            other => Err(ValidationError::UnknownClassCode(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Licit => "licit",
            Self::Illicit => "illicit",
        }
    }
}

impl std::fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Feature vector ────────────────────────────────────────────────

/// Fixed-dimension feature vector (exactly [`FEATURE_DIM`] values).
///
/// Serialized as a plain JSON array; deserialization rejects any other
/// length, so a malformed record never reaches the graph store.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector(Box<[f64; FEATURE_DIM]>);

impl FeatureVector {
    /// An all-zero vector, mostly useful in tests.
    pub fn zeroed() -> Self {
        Self(Box::new([0.0; FEATURE_DIM]))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0[..]
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = ValidationError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let got = values.len();
        let arr: Box<[f64; FEATURE_DIM]> = values
            .into_boxed_slice()
            .try_into()
            .map_err(|_| ValidationError::FeatureLength { got })?;
        Ok(Self(arr))
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(v: FeatureVector) -> Self {
        v.0.to_vec()
    }
}

impl std::fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FeatureVector[{FEATURE_DIM}]")
    }
}

// ── Records ───────────────────────────────────────────────────────

/// A validated transaction as produced by the preprocessing stage.
///
/// `class_label` and `features` are immutable once ingested;
/// re-ingestion of the same `tx_id` is an idempotent no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub tx_id: TxId,
    pub class_label: ClassLabel,
    pub time_step: TimeStep,
    pub features: FeatureVector,
}

impl TransactionRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tx_id.as_str().is_empty() {
            return Err(ValidationError::EmptyTxId);
        }
        if self.time_step == 0 || self.time_step > MAX_TIME_STEP {
            return Err(ValidationError::TimeStepOutOfRange(self.time_step));
        }
        Ok(())
    }
}

/// A directed edge between two transactions, visible from `time_step`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeRecord {
    pub from_tx: TxId,
    pub to_tx: TxId,
    pub time_step: TimeStep,
}

impl EdgeRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from_tx.as_str().is_empty() || self.to_tx.as_str().is_empty() {
            return Err(ValidationError::EmptyTxId);
        }
        if self.time_step == 0 || self.time_step > MAX_TIME_STEP {
            return Err(ValidationError::TimeStepOutOfRange(self.time_step));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, step: TimeStep) -> TransactionRecord {
        TransactionRecord {
            tx_id: TxId::new(id),
            class_label: ClassLabel::Unknown,
            time_step: step,
            features: FeatureVector::zeroed(),
        }
    }

    #[test]
    fn test_class_label_codes() {
        assert_eq!(ClassLabel::from_code(0).unwrap(), ClassLabel::Unknown);
        assert_eq!(ClassLabel::from_code(1).unwrap(), ClassLabel::Licit);
        assert_eq!(ClassLabel::from_code(2).unwrap(), ClassLabel::Illicit);
        assert!(matches!(
            ClassLabel::from_code(3),
            Err(ValidationError::UnknownClassCode(3))
        ));
    }

    #[test]
    fn test_feature_vector_length_enforced() {
        assert!(FeatureVector::try_from(vec![0.0; FEATURE_DIM]).is_ok());
        assert!(matches!(
            FeatureVector::try_from(vec![0.0; 10]),
            Err(ValidationError::FeatureLength { got: 10 })
        ));
    }

    #[test]
    fn test_feature_vector_serde_round_trip() {
        let v = FeatureVector::zeroed();
        let json = serde_json::to_string(&v).unwrap();
        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        let short = serde_json::to_string(&vec![1.0, 2.0]).unwrap();
        assert!(serde_json::from_str::<FeatureVector>(&short).is_err());
    }

    #[test]
    fn test_record_validation() {
        assert!(record("tx-1", 1).validate().is_ok());
        assert!(record("tx-1", MAX_TIME_STEP).validate().is_ok());
        assert!(matches!(
            record("", 1).validate(),
            Err(ValidationError::EmptyTxId)
        ));
        assert!(matches!(
            record("tx-1", 0).validate(),
            Err(ValidationError::TimeStepOutOfRange(0))
        ));
        assert!(matches!(
            record("tx-1", MAX_TIME_STEP + 1).validate(),
            Err(ValidationError::TimeStepOutOfRange(_))
        ));
    }

    #[test]
    fn test_edge_validation() {
        let edge = EdgeRecord {
            from_tx: TxId::new("a"),
            to_tx: TxId::new("b"),
            time_step: 3,
        };
        assert!(edge.validate().is_ok());

        let bad = EdgeRecord {
            from_tx: TxId::new("a"),
            to_tx: TxId::new(""),
            time_step: 3,
        };
        assert!(matches!(bad.validate(), Err(ValidationError::EmptyTxId)));
    }
}
