//! Statute corpus loading.
//!
//! Reads the corpus — a JSON array of section records — from a single file.
//! A missing or unparseable corpus is a fatal, immediately-reported
//! condition: ingestion is an operator-triggered batch action and there is
//! nothing sensible to retry.

use std::path::{Path, PathBuf};

use crate::models::SourceRecord;

/// Errors raised while loading the corpus file.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read corpus file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus file is not a JSON array of section records: {path}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load the corpus file into an ordered sequence of records.
///
/// The order of the returned records is the order in the file; downstream
/// stages preserve it.
pub fn load_corpus(path: &Path) -> Result<Vec<SourceRecord>, CorpusError> {
    if !path.exists() {
        return Err(CorpusError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| CorpusError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
