//! Question → points table.
//!
//! The table is supplied alongside the reference solution as a flat JSON
//! object, e.g. `{"Q1": 10, "Q2": 10, "Q3": 10}`. Its sum is the total a
//! submission can earn; scores are normalised against it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::paths::write_atomic;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScoreTable {
    points: BTreeMap<String, f64>,
}

impl ScoreTable {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            points: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn points(&self, question_id: &str) -> Option<f64> {
        self.points.get(question_id).copied()
    }

    pub fn total(&self) -> f64 {
        self.points.values().sum()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.points.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Read a score table from disk.
    pub fn load(path: &Path) -> Result<Self, String> {
        use std::io::ErrorKind;

        // Short, standardized I/O errors
        let s = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                let msg = match e.kind() {
                    ErrorKind::NotFound => format!("Score table not found: {}", path.display()),
                    ErrorKind::PermissionDenied => {
                        "Permission denied reading score table".to_string()
                    }
                    ErrorKind::InvalidData => "Score table is not valid UTF-8".to_string(),
                    _ => format!("Failed to read score table ({})", e.kind()),
                };
                return Err(msg);
            }
        };

        let table: ScoreTable = serde_json::from_str(&s)
            .map_err(|_| "Invalid score table JSON (expected {\"Q1\": 10, ...})".to_string())?;

        if let Some((id, v)) = table.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(format!("Score for {id} must be a non-negative number, got {v}"));
        }
        Ok(table)
    }

    /// Save the table as pretty JSON (atomic-ish write).
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let pretty = serde_json::to_string_pretty(self)
            .map_err(|_| "Failed to serialize score table".to_string())?;
        write_atomic(path, pretty.as_bytes()).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                "Permission denied writing score table".to_string()
            }
            _ => "Failed to write score table".to_string(),
        })
    }
}
