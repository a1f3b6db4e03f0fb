//!
//! File Loader Utility
//!
//! Loads the notebooks and JSON files a grading run consumes, checking that
//! each path exists, is a regular file and stays under a size limit before
//! anything is parsed. Also writes the scratch notebooks a run produces.
//!
//! # Error Handling
//!
//! Unparseable notebooks become [`MarkerError::MalformedDocument`] carrying
//! the path; everything that prevents reading the file becomes
//! [`MarkerError::IoError`]. Details are logged, the returned messages stay short.

use crate::error::MarkerError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::error;
use util::notebook::{Notebook, NotebookError};

/// Maximum allowed size for JSON side files (clean reference, score table).
const MAX_JSON_SIZE: u64 = 2 * 1024 * 1024; // 2MB

/// Checks that a file exists, is a file, and (optionally) does not exceed a maximum size.
///
/// # Errors
///
/// Returns [`MarkerError::IoError`] if the file is missing, not a file or
/// unreadable, and [`MarkerError::MalformedDocument`] if it is too large.
pub fn check_file(path: &Path, max_size: Option<u64>) -> Result<(), MarkerError> {
    if !path.exists() {
        error!("File not found: {}", path.display());
        return Err(MarkerError::IoError(format!(
            "File not found: {}",
            path.display()
        )));
    }

    if !path.is_file() {
        error!("Not a file: {}", path.display());
        return Err(MarkerError::IoError(format!("Not a file: {}", path.display())));
    }

    let metadata = fs::metadata(path).map_err(|e| {
        error!("File unreadable: {} - {}", path.display(), e);
        MarkerError::IoError(format!("File unreadable: {}", path.display()))
    })?;

    if let Some(max) = max_size {
        if metadata.len() > max {
            error!(
                "File too large: {} ({} bytes, max {} bytes)",
                path.display(),
                metadata.len(),
                max
            );
            return Err(MarkerError::MalformedDocument(path.display().to_string()));
        }
    }

    Ok(())
}

/// Loads a notebook, rejecting files larger than `max_bytes` as malformed.
pub fn load_notebook(path: &Path, max_bytes: u64) -> Result<Notebook, MarkerError> {
    check_file(path, Some(max_bytes))?;

    Notebook::load(path, max_bytes).map_err(|e| match e {
        NotebookError::Io(io) => {
            error!("Failed to read notebook {}: {}", path.display(), io);
            MarkerError::IoError(format!("Failed to read {}", path.display()))
        }
        other => {
            error!("Invalid notebook {}: {}", path.display(), other);
            MarkerError::MalformedDocument(path.display().to_string())
        }
    })
}

/// Writes a scratch or output notebook.
pub fn save_notebook(notebook: &Notebook, path: &Path) -> Result<(), MarkerError> {
    notebook.save(path).map_err(|e| {
        error!("Failed to write notebook {}: {}", path.display(), e);
        MarkerError::IoError(format!("Failed to write {}", path.display()))
    })
}

/// Loads and deserializes a small JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, MarkerError> {
    check_file(path, Some(MAX_JSON_SIZE)).map_err(|e| match e {
        MarkerError::MalformedDocument(_) => MarkerError::InvalidJson(format!("{what} is too large")),
        other => other,
    })?;

    let bytes = fs::read(path).map_err(|e| {
        error!("Failed to read {} {}: {}", what, path.display(), e);
        MarkerError::IoError(format!("Failed to load {what}"))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        error!("Invalid JSON in {} {}: {}", what, path.display(), e);
        MarkerError::InvalidJson(format!("Failed to parse {what}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"{"cells": [], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#;

    #[test]
    fn test_load_valid_notebook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alice.ipynb");
        fs::write(&path, MINIMAL).unwrap();
        let nb = load_notebook(&path, 1024).unwrap();
        assert!(nb.cells.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_notebook(&dir.path().join("ghost.ipynb"), 1024).unwrap_err();
        assert!(matches!(err, MarkerError::IoError(msg) if msg.contains("File not found")));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempdir().unwrap();
        let err = check_file(dir.path(), None).unwrap_err();
        assert!(matches!(err, MarkerError::IoError(msg) if msg.contains("Not a file")));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bob.ipynb");
        fs::write(&path, "{ this is not json").unwrap();
        let err = load_notebook(&path, 1024).unwrap_err();
        assert_eq!(err.to_string(), format!("Not a valid notebook: {}", path.display()));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("carol.ipynb");
        fs::write(&path, [0xffu8, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            load_notebook(&path, 1024).unwrap_err(),
            MarkerError::MalformedDocument(_)
        ));
    }

    #[test]
    fn test_oversized_notebook_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.ipynb");
        fs::write(&path, MINIMAL).unwrap();
        assert!(matches!(
            load_notebook(&path, 8).unwrap_err(),
            MarkerError::MalformedDocument(_)
        ));
    }

    #[test]
    fn test_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(&path, r#"{"Q1": 10}"#).unwrap();
        let map: BTreeMap<String, f64> = load_json(&path, "score table").unwrap();
        assert_eq!(map["Q1"], 10.0);

        fs::write(&path, "[").unwrap();
        let err = load_json::<BTreeMap<String, f64>>(&path, "score table").unwrap_err();
        assert!(matches!(err, MarkerError::InvalidJson(_)));
    }
}
