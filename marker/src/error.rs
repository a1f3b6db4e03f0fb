//! Marker Error Types
//!
//! [`MarkerError`] covers every failure of the grading pipeline. Per-submission
//! variants (`MalformedDocument`, `StructuralMismatch`, `ExecutionFault`) are
//! turned into grade records and error-log lines by the batch runner; the rest
//! concern the run's own inputs and outputs and abort the run.
//!
//! # Example
//!
//! ```rust
//! use marker::error::MarkerError;
//!
//! fn check_cells(expected: usize, actual: usize) -> Result<(), MarkerError> {
//!     if expected != actual {
//!         return Err(MarkerError::StructuralMismatch { expected, actual });
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(
//!     check_cells(5, 4).unwrap_err().to_string(),
//!     "Incorrect number of cells: expected 5, got 4"
//! );
//! ```

use code_runner::SandboxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkerError {
    /// Input is not a parseable notebook (bad encoding or invalid JSON/schema).
    #[error("Not a valid notebook: {0}")]
    MalformedDocument(String),

    /// The assembled notebook does not have the expected number of cells.
    #[error("Incorrect number of cells: expected {expected}, got {actual}")]
    StructuralMismatch { expected: usize, actual: usize },

    /// The sandbox failed to execute the document.
    #[error("{0}")]
    ExecutionFault(#[from] SandboxError),

    /// A required field or input is missing.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// The score table does not fit the reference questions.
    #[error("Score table mismatch: {0}")]
    WeightMismatch(String),

    /// I/O error (file not found, unreadable, unwritable).
    #[error("I/O error: {0}")]
    IoError(String),

    /// JSON is malformed or does not match the expected schema.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The reference solution cannot be used for grading.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}
