//! Notebook document model.
//!
//! Reads and writes the nbformat-4 JSON layout. Cells are discriminated by
//! `cell_type`, outputs by `output_type`; unknown metadata is carried through
//! untouched so a filtered or assembled document round-trips everything the
//! grader does not itself interpret.

mod document;
mod output;
mod question;

pub use document::{Cell, CodeCell, Notebook, NotebookError, TextCell};
pub use output::Output;
pub use question::{QuestionTag, cell_roles, question_tag, role_id};
