use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::output::Output;
use crate::paths::write_atomic;

#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("notebook is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed notebook: {0}")]
    Malformed(String),

    #[error("notebook is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotebookError {
    /// `true` for every failure that means the bytes are not a usable notebook,
    /// as opposed to the file being unreadable.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, NotebookError::Io(_))
    }
}

/// An nbformat-4 notebook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notebook {
    pub cells: Vec<Cell>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default = "default_nbformat")]
    pub nbformat: u32,

    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Code(CodeCell),
    Markdown(TextCell),
    Raw(TextCell),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CodeCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default, deserialize_with = "multiline")]
    pub source: String,

    #[serde(default)]
    pub outputs: Vec<Output>,

    #[serde(default)]
    pub execution_count: Option<u64>,
}

/// Markdown and raw cells share a layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default, deserialize_with = "multiline")]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
}

/// nbformat stores multi-line strings either whole or split into lines.
pub(crate) fn multiline<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Multiline::deserialize(deserializer)? {
        Multiline::One(s) => s,
        Multiline::Many(lines) => lines.concat(),
    })
}

fn default_nbformat() -> u32 {
    4
}

fn default_nbformat_minor() -> u32 {
    5
}

impl Notebook {
    /// An empty python3 notebook.
    pub fn empty() -> Self {
        let metadata = json!({
            "kernelspec": {
                "display_name": "Python 3",
                "language": "python",
                "name": "python3"
            },
            "language_info": { "name": "python" }
        });

        Notebook {
            cells: Vec::new(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            nbformat: default_nbformat(),
            nbformat_minor: default_nbformat_minor(),
        }
    }

    /// Parse notebook bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, NotebookError> {
        let text = std::str::from_utf8(bytes).map_err(|_| NotebookError::InvalidUtf8)?;
        let nb: Notebook =
            serde_json::from_str(text).map_err(|e| NotebookError::Malformed(e.to_string()))?;
        if nb.nbformat != 4 {
            return Err(NotebookError::Malformed(format!(
                "unsupported nbformat {}",
                nb.nbformat
            )));
        }
        Ok(nb)
    }

    /// Read and parse a notebook, refusing files larger than `max_bytes`.
    pub fn load(path: &Path, max_bytes: u64) -> Result<Self, NotebookError> {
        let size = fs::metadata(path)?.len();
        if size > max_bytes {
            return Err(NotebookError::TooLarge {
                size,
                limit: max_bytes,
            });
        }
        let bytes = fs::read(path)?;
        Self::from_slice(&bytes)
    }

    pub fn to_json_pretty(&self) -> Result<String, NotebookError> {
        serde_json::to_string_pretty(self).map_err(|e| NotebookError::Malformed(e.to_string()))
    }

    /// Write the notebook through a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), NotebookError> {
        let json = self.to_json_pretty()?;
        write_atomic(path, json.as_bytes())?;
        Ok(())
    }

    /// Give every cell a unique id. Existing unique ids are kept.
    pub fn ensure_cell_ids(&mut self) {
        let mut seen = HashSet::new();
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            let keep = match cell.id() {
                Some(id) if !id.is_empty() => seen.insert(id.to_string()),
                _ => false,
            };
            if keep {
                continue;
            }
            let mut candidate = format!("cell-{idx}");
            let mut n = 1;
            while seen.contains(&candidate) {
                candidate = format!("cell-{idx}-{n}");
                n += 1;
            }
            seen.insert(candidate.clone());
            cell.set_id(candidate);
        }
    }
}

impl Cell {
    pub fn code(source: impl Into<String>) -> Self {
        Cell::Code(CodeCell {
            source: source.into(),
            ..CodeCell::default()
        })
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Cell::Markdown(TextCell {
            source: source.into(),
            ..TextCell::default()
        })
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Cell::Code(_))
    }

    pub fn as_code(&self) -> Option<&CodeCell> {
        match self {
            Cell::Code(c) => Some(c),
            _ => None,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Cell::Code(c) => &c.source,
            Cell::Markdown(t) | Cell::Raw(t) => &t.source,
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        match self {
            Cell::Code(c) => &c.metadata,
            Cell::Markdown(t) | Cell::Raw(t) => &t.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Cell::Code(c) => &mut c.metadata,
            Cell::Markdown(t) | Cell::Raw(t) => &mut t.metadata,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Cell::Code(c) => c.id.as_deref(),
            Cell::Markdown(t) | Cell::Raw(t) => t.id.as_deref(),
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = Some(id.into());
        match self {
            Cell::Code(c) => c.id = id,
            Cell::Markdown(t) | Cell::Raw(t) => t.id = id,
        }
    }

    /// Outputs of a code cell; empty for every other kind.
    pub fn outputs(&self) -> &[Output] {
        match self {
            Cell::Code(c) => &c.outputs,
            _ => &[],
        }
    }

    /// Drop outputs and execution count so a cell can be re-run cleanly.
    pub fn clear_outputs(&mut self) {
        if let Cell::Code(c) = self {
            c.outputs.clear();
            c.execution_count = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r##"{
        "cells": [
            {"cell_type": "markdown", "metadata": {}, "source": ["# Lab 2\n", "Answer below."]},
            {"cell_type": "code", "id": "a1", "metadata": {"question": ["Q1", 10]},
             "source": ["x = 5\n", "print(x)"], "execution_count": 1,
             "outputs": [{"output_type": "stream", "name": "stdout", "text": ["5\n"]}]},
            {"cell_type": "raw", "metadata": {}, "source": "raw text"}
        ],
        "metadata": {"kernelspec": {"name": "python3"}},
        "nbformat": 4,
        "nbformat_minor": 5
    }"##;

    #[test]
    fn parses_list_and_string_sources() {
        let nb = Notebook::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(nb.cells.len(), 3);
        assert_eq!(nb.cells[0].source(), "# Lab 2\nAnswer below.");
        assert_eq!(nb.cells[1].source(), "x = 5\nprint(x)");
        assert_eq!(nb.cells[2].source(), "raw text");
        assert_eq!(nb.cells[1].id(), Some("a1"));
        assert_eq!(nb.cells[1].outputs()[0].text().as_deref(), Some("5\n"));
        assert!(nb.cells[0].outputs().is_empty());
    }

    #[test]
    fn serialises_back_to_nbformat() {
        let nb = Notebook::from_slice(SAMPLE.as_bytes()).unwrap();
        let value: Value = serde_json::from_str(&nb.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["cells"][1]["cell_type"], "code");
        assert_eq!(value["cells"][1]["outputs"][0]["output_type"], "stream");
        assert_eq!(value["cells"][0]["cell_type"], "markdown");
        assert!(value["cells"][0].get("outputs").is_none());
        assert_eq!(value["nbformat"], 4);

        let again = Notebook::from_slice(value.to_string().as_bytes()).unwrap();
        assert_eq!(again, nb);
    }

    #[test]
    fn code_cells_always_carry_execution_count() {
        let mut nb = Notebook::empty();
        nb.cells.push(Cell::code("1 + 1"));
        let value: Value = serde_json::to_value(&nb).unwrap();
        assert!(value["cells"][0]["execution_count"].is_null());
        assert!(value["cells"][0]["outputs"].as_array().unwrap().is_empty());
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = Notebook::from_slice(&[0xff, 0xfe, b'{']).unwrap_err();
        assert!(matches!(err, NotebookError::InvalidUtf8));
        assert!(err.is_malformed());
    }

    #[test]
    fn wrong_schema_is_malformed() {
        for raw in ["{}", "not json", r#"{"cells": [{"cell_type": "widget"}]}"#] {
            let err = Notebook::from_slice(raw.as_bytes()).unwrap_err();
            assert!(matches!(err, NotebookError::Malformed(_)), "{raw}: {err}");
        }
        let v3 = r#"{"cells": [], "metadata": {}, "nbformat": 3, "nbformat_minor": 0}"#;
        assert!(Notebook::from_slice(v3.as_bytes()).is_err());
    }

    #[test]
    fn load_enforces_size_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.ipynb");
        fs::write(&path, SAMPLE).unwrap();

        let err = Notebook::load(&path, 10).unwrap_err();
        assert!(matches!(err, NotebookError::TooLarge { limit: 10, .. }));
        assert!(Notebook::load(&path, 1024 * 1024).is_ok());
    }

    #[test]
    fn missing_file_is_io_not_malformed() {
        let dir = tempdir().unwrap();
        let err = Notebook::load(&dir.path().join("absent.ipynb"), 1024).unwrap_err();
        assert!(!err.is_malformed());
    }

    #[test]
    fn ensure_cell_ids_dedupes() {
        let mut nb = Notebook::empty();
        let mut a = Cell::code("a");
        a.set_id("same");
        let mut b = Cell::code("b");
        b.set_id("same");
        nb.cells = vec![a, b, Cell::markdown("c")];

        nb.ensure_cell_ids();
        let ids: Vec<&str> = nb.cells.iter().filter_map(|c| c.id()).collect();
        assert_eq!(ids, vec!["same", "cell-1", "cell-2"]);
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("nb.ipynb");
        let nb = Notebook::from_slice(SAMPLE.as_bytes()).unwrap();
        nb.save(&path).unwrap();
        assert_eq!(Notebook::load(&path, u64::MAX).unwrap(), nb);
    }

    #[test]
    fn clear_outputs_resets_code_cells() {
        let mut nb = Notebook::from_slice(SAMPLE.as_bytes()).unwrap();
        nb.cells[1].clear_outputs();
        assert!(nb.cells[1].outputs().is_empty());
        assert_eq!(nb.cells[1].as_code().unwrap().execution_count, None);
    }
}
