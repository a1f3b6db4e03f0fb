//! Test injection.
//!
//! An assembled notebook has a fixed shape:
//!
//! ```text
//! [ battery[0] (preamble) | identity cell | answer cells ... | battery[1..] ]
//! ```
//!
//! so its length is always `answer_cells + 2 + (battery_len - 1)`. Anything
//! else means the submission did not have the expected answer cells, and it is
//! rejected before any execution time is spent on it.

use crate::error::MarkerError;
use crate::utilities::file_loader::load_notebook;
use std::path::Path;
use util::notebook::{Cell, Notebook};

/// Name of the variable the identity cell binds to the student identifier.
pub const IDENTITY_VARIABLE: &str = "student_id";

/// The ordered test cells appended to every filtered submission.
/// Cell 0 is the preamble and goes in front instead.
#[derive(Debug, Clone)]
pub struct TestBattery {
    cells: Vec<Cell>,
}

impl TestBattery {
    pub fn new(cells: Vec<Cell>) -> Result<Self, MarkerError> {
        if cells.is_empty() {
            return Err(MarkerError::MissingField(
                "test battery has no preamble cell".into(),
            ));
        }
        Ok(Self { cells })
    }

    pub fn from_notebook(notebook: Notebook) -> Result<Self, MarkerError> {
        Self::new(notebook.cells)
    }

    pub fn load(path: &Path, max_bytes: u64) -> Result<Self, MarkerError> {
        Self::from_notebook(load_notebook(path, max_bytes)?)
    }

    pub fn preamble(&self) -> &Cell {
        &self.cells[0]
    }

    /// Battery cells after the preamble.
    pub fn tests(&self) -> &[Cell] {
        &self.cells[1..]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Length of a correctly assembled notebook with `answer_cells` answers.
    pub fn assembled_len(&self, answer_cells: usize) -> usize {
        answer_cells + 2 + (self.len() - 1)
    }
}

/// A code cell binding [`IDENTITY_VARIABLE`] to the student identifier.
pub fn identity_cell(student_id: &str) -> Cell {
    // A JSON string literal is also a valid Python string literal.
    let literal = serde_json::to_string(student_id).unwrap_or_else(|_| "\"\"".into());
    Cell::code(format!("{IDENTITY_VARIABLE} = {literal}\n"))
}

/// Build the notebook to execute for one submission.
///
/// Outputs carried over from the student's own runs are cleared, and every
/// cell gets a unique id.
///
/// # Errors
///
/// [`MarkerError::StructuralMismatch`] when the assembled length differs from
/// [`TestBattery::assembled_len`] for `expected_answer_cells`.
pub fn inject(
    filtered: Vec<Cell>,
    battery: &TestBattery,
    student_id: &str,
    expected_answer_cells: usize,
) -> Result<Notebook, MarkerError> {
    let mut cells = Vec::with_capacity(filtered.len() + battery.len() + 1);
    cells.push(battery.preamble().clone());
    cells.push(identity_cell(student_id));
    cells.extend(filtered);
    cells.extend(battery.tests().iter().cloned());

    let expected = battery.assembled_len(expected_answer_cells);
    if cells.len() != expected {
        return Err(MarkerError::StructuralMismatch {
            expected,
            actual: cells.len(),
        });
    }

    for cell in &mut cells {
        cell.clear_outputs();
    }

    let mut assembled = Notebook::empty();
    assembled.cells = cells;
    assembled.ensure_cell_ids();
    Ok(assembled)
}
