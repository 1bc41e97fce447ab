//! JSONL record sources.
//!
//! One record per line; every record is validated before it is handed
//! to the ingestor, and errors carry the 1-based line number.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use txlens_core::{EdgeRecord, TransactionRecord, ValidationError};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: malformed record: {source}")]
    Parse {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}:{line}: {source}")]
    Validation {
        path: String,
        line: usize,
        #[source]
        source: ValidationError,
    },
}

/// Load and validate transaction records from a JSONL file.
pub fn load_transactions(path: impl AsRef<Path>) -> Result<Vec<TransactionRecord>, SourceError> {
    load_jsonl(path.as_ref(), |record: &TransactionRecord| record.validate())
}

/// Load and validate edge records from a JSONL file.
pub fn load_edges(path: impl AsRef<Path>) -> Result<Vec<EdgeRecord>, SourceError> {
    load_jsonl(path.as_ref(), |record: &EdgeRecord| record.validate())
}

fn load_jsonl<T, F>(path: &Path, validate: F) -> Result<Vec<T>, SourceError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), ValidationError>,
{
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|source| SourceError::Io {
        path: path_str.clone(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| SourceError::Io {
            path: path_str.clone(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: T = serde_json::from_str(&line).map_err(|source| SourceError::Parse {
            path: path_str.clone(),
            line: idx + 1,
            source,
        })?;
        validate(&record).map_err(|source| SourceError::Validation {
            path: path_str.clone(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    tracing::info!(path = %path_str, records = records.len(), "Loaded records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use txlens_core::FEATURE_DIM;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn node_line(id: &str, step: u32) -> String {
        let features = vec![0.0f64; FEATURE_DIM];
        format!(
            r#"{{"tx_id":"{id}","class_label":"licit","time_step":{step},"features":{}}}"#,
            serde_json::to_string(&features).unwrap()
        )
    }

    #[test]
    fn test_load_transactions_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let contents = format!("{}\n\n{}\n", node_line("a", 1), node_line("b", 2));
        let path = write_file(&dir, "nodes.jsonl", &contents);

        let records = load_transactions(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tx_id.as_str(), "a");
        assert_eq!(records[1].time_step, 2);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let contents = format!("{}\nnot json\n", node_line("a", 1));
        let path = write_file(&dir, "nodes.jsonl", &contents);

        let err = load_transactions(&path).unwrap_err();
        match err {
            SourceError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_step_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "nodes.jsonl", &node_line("a", 99));

        let err = load_transactions(&path).unwrap_err();
        match err {
            SourceError::Validation { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_edges() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "edges.jsonl",
            r#"{"from_tx":"a","to_tx":"b","time_step":3}"#,
        );

        let edges = load_edges(&path).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from_tx.as_str(), "a");
        assert_eq!(edges[0].time_step, 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_transactions("/nonexistent/nodes.jsonl").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
