//! Shared building blocks for the notebook grader workspace.
//!
//! - [`notebook`]: the notebook document model (cells, outputs, question metadata).
//! - [`execution_config`]: per-assignment grading configuration loaded from JSON.
//! - [`config`]: process-wide settings loaded from the environment.
//! - [`score_table`]: the externally supplied question → points table.
//! - [`paths`]: scratch and report locations.

pub mod config;
pub mod execution_config;
pub mod notebook;
pub mod paths;
pub mod score_table;
pub mod test_helpers;
