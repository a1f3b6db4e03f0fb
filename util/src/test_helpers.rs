//! Builders shared by the workspace's tests.

use serde_json::{Map, Value, json};
use tempfile::TempDir;

use crate::config::AppConfig;
use crate::notebook::{Cell, CodeCell, Notebook, Output};
use crate::paths::ScratchDirs;

/// Creates a unique temporary directory and points `AppConfig::scratch_root`
/// at it. The directory is removed when the returned `TempDir` is dropped.
///
/// Keep the returned `TempDir` in scope for as long as you need the files.
pub fn setup_test_scratch() -> TempDir {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let abs = tmp
        .path()
        .canonicalize()
        .unwrap_or_else(|_| tmp.path().to_path_buf());
    AppConfig::set_scratch_root(abs.to_string_lossy().to_string());
    tmp
}

/// Scratch layout inside a fresh temporary directory, without touching global config.
pub fn temp_scratch() -> (TempDir, ScratchDirs) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let dirs = ScratchDirs::new(tmp.path());
    (tmp, dirs)
}

pub fn notebook_of(cells: Vec<Cell>) -> Notebook {
    let mut nb = Notebook::empty();
    nb.cells = cells;
    nb
}

/// A code cell tagged as a question, in the `["Q1", 10]` form.
pub fn question_cell(source: &str, id: &str, points: f64) -> Cell {
    let mut metadata = Map::new();
    metadata.insert("question".into(), json!([id, points]));
    Cell::Code(CodeCell {
        source: source.into(),
        metadata,
        ..CodeCell::default()
    })
}

/// A code cell carrying an explicit `grader_role`.
pub fn role_cell(source: &str, role: &str) -> Cell {
    let mut metadata = Map::new();
    metadata.insert("grader_role".into(), Value::String(role.into()));
    Cell::Code(CodeCell {
        source: source.into(),
        metadata,
        ..CodeCell::default()
    })
}

/// Replace the outputs of a code cell; other cell kinds are returned unchanged.
pub fn with_outputs(cell: Cell, outputs: Vec<Output>) -> Cell {
    match cell {
        Cell::Code(mut c) => {
            c.outputs = outputs;
            Cell::Code(c)
        }
        other => other,
    }
}
