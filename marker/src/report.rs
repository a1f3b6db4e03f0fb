//! # Grade Report Module
//!
//! Types persisted at the end of a grading run.
//!
//! ## JSON Output Example
//!
//! `grades.json` maps each student identifier, sorted, to its record:
//!
//! ```json
//! {
//!   "alice": { "score": 66.67, "feedback": "Q2: wrong answer; " },
//!   "bob": { "score": 0.0, "feedback": "Invalid file" }
//! }
//! ```
//!
//! `errors.txt` holds one message per line, in the order submissions were
//! encountered.

use crate::error::MarkerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use util::paths::{errors_path, grades_path, write_atomic};

/// Feedback of a submission that could not be parsed.
pub const INVALID_FILE: &str = "Invalid file";
/// Feedback of a submission collapsed by degenerate detection.
pub const INVALID_SUBMISSION: &str = "Invalid submission";

/// Final score and feedback of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    /// Percentage, 0 to 100.
    pub score: f64,
    /// Concatenated per-question notes.
    pub feedback: String,
}

impl GradeRecord {
    pub fn invalid_file() -> Self {
        Self {
            score: 0.0,
            feedback: INVALID_FILE.to_string(),
        }
    }

    pub fn invalid_submission() -> Self {
        Self {
            score: 0.0,
            feedback: INVALID_SUBMISSION.to_string(),
        }
    }

    /// Zero score carrying the rejection reason as feedback.
    pub fn rejected(reason: &MarkerError) -> Self {
        Self {
            score: 0.0,
            feedback: reason.to_string(),
        }
    }
}

/// Everything a grading run produced. Owned by the caller; nothing is kept
/// between runs.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    pub grades: BTreeMap<String, GradeRecord>,
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, student_id: impl Into<String>, record: GradeRecord) {
        self.grades.insert(student_id.into(), record);
    }

    /// Append an error message. Line breaks are folded so each error stays on one line.
    pub fn push_error(&mut self, message: impl AsRef<str>) {
        let line = message
            .as_ref()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        tracing::warn!("{}", line);
        self.errors.push(line);
    }

    pub fn contains(&self, student_id: &str) -> bool {
        self.grades.contains_key(student_id)
    }

    pub fn len(&self) -> usize {
        self.grades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }

    pub fn grades_json(&self) -> Result<String, MarkerError> {
        serde_json::to_string_pretty(&self.grades)
            .map_err(|e| MarkerError::InvalidJson(format!("Failed to serialize grades: {e}")))
    }

    pub fn errors_text(&self) -> String {
        self.errors.iter().map(|e| format!("{e}\n")).collect()
    }

    /// Write `grades.json` and `errors.txt` into `output_dir`.
    pub fn write(&self, output_dir: &Path) -> Result<(), MarkerError> {
        let grades = grades_path(output_dir);
        write_atomic(&grades, self.grades_json()?.as_bytes()).map_err(|e| {
            MarkerError::IoError(format!("Failed to write {}: {e}", grades.display()))
        })?;

        let errors = errors_path(output_dir);
        write_atomic(&errors, self.errors_text().as_bytes()).map_err(|e| {
            MarkerError::IoError(format!("Failed to write {}: {e}", errors.display()))
        })?;

        tracing::info!(
            graded = self.grades.len(),
            errors = self.errors.len(),
            dir = %output_dir.display(),
            "wrote grade report"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn grades_are_sorted_by_student() {
        let mut report = BatchReport::new();
        report.record("zoe", GradeRecord { score: 50.0, feedback: "Q1: wrong answer; ".into() });
        report.record("adam", GradeRecord::invalid_file());
        report.record("mia", GradeRecord { score: 100.0, feedback: String::new() });

        let json = report.grades_json().unwrap();
        let a = json.find("\"adam\"").unwrap();
        let m = json.find("\"mia\"").unwrap();
        let z = json.find("\"zoe\"").unwrap();
        assert!(a < m && m < z);

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["adam"]["score"], 0.0);
        assert_eq!(value["adam"]["feedback"], "Invalid file");
    }

    #[test]
    fn errors_are_one_per_line_in_order() {
        let mut report = BatchReport::new();
        report.push_error("Not a valid notebook: b.ipynb");
        report.push_error("Error executing the notebook \"a.ipynb\": cell execution failed:\nTraceback\n  line 3");
        assert_eq!(
            report.errors_text(),
            "Not a valid notebook: b.ipynb\nError executing the notebook \"a.ipynb\": cell execution failed: Traceback line 3\n"
        );
    }

    #[test]
    fn write_creates_both_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("reports");
        let mut report = BatchReport::new();
        report.record("alice", GradeRecord { score: 66.67, feedback: "Q2: wrong answer; ".into() });

        report.write(&out).unwrap();

        let grades: BTreeMap<String, GradeRecord> =
            serde_json::from_str(&fs::read_to_string(out.join("grades.json")).unwrap()).unwrap();
        assert_eq!(grades["alice"].score, 66.67);
        assert_eq!(fs::read_to_string(out.join("errors.txt")).unwrap(), "");
    }

    #[test]
    fn rejected_record_carries_reason() {
        let record = GradeRecord::rejected(&MarkerError::StructuralMismatch { expected: 9, actual: 7 });
        assert_eq!(record.score, 0.0);
        assert_eq!(record.feedback, "Incorrect number of cells: expected 9, got 7");
    }
}
