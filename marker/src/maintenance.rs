//! Upkeep of reference notebooks.
//!
//! Authoring tools sometimes leave several solution notebooks with the same
//! nbgrader `grade_id`s. [`reseed_grade_ids`] replaces every id under a
//! directory with a fresh random 16-bit value.

use crate::error::MarkerError;
use crate::utilities::file_loader::{load_notebook, save_notebook};
use rand::Rng;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};
use util::notebook::Notebook;
use walkdir::WalkDir;

/// Replace every `metadata.nbgrader.grade_id` in `notebook`. Returns how many
/// ids were rewritten.
pub fn reseed_notebook<R: Rng>(notebook: &mut Notebook, rng: &mut R) -> usize {
    let mut rewritten = 0;
    for cell in &mut notebook.cells {
        let Some(Value::Object(nbgrader)) = cell.metadata_mut().get_mut("nbgrader") else {
            continue;
        };
        if let Some(grade_id) = nbgrader.get_mut("grade_id") {
            *grade_id = Value::String(rng.gen_range(0..=u16::MAX).to_string());
            rewritten += 1;
        }
    }
    rewritten
}

/// Rewrite the grade ids of every notebook under `root`.
///
/// Checkpoint copies are left alone. Files that are not notebooks are skipped
/// with a warning. Returns the number of notebooks rewritten.
pub fn reseed_grade_ids<R: Rng>(
    root: &Path,
    rng: &mut R,
    max_notebook_bytes: u64,
) -> Result<usize, MarkerError> {
    if !root.is_dir() {
        return Err(MarkerError::IoError(format!(
            "Directory not found: {}",
            root.display()
        )));
    }

    let mut notebooks = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| MarkerError::IoError(e.to_string()))?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !entry.file_type().is_file() || relative.to_string_lossy().contains("checkpoint") {
            continue;
        }

        let mut notebook = match load_notebook(path, max_notebook_bytes) {
            Ok(nb) => nb,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let rewritten = reseed_notebook(&mut notebook, rng);
        save_notebook(&notebook, path)?;
        info!(path = %path.display(), rewritten, "reseeded grade ids");
        notebooks += 1;
    }

    Ok(notebooks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;
    use util::notebook::Cell;
    use util::test_helpers::notebook_of;

    fn graded_cell(grade_id: &str) -> Cell {
        let mut cell = Cell::code("answer = 1");
        cell.metadata_mut().insert(
            "nbgrader".into(),
            json!({"grade": true, "grade_id": grade_id, "points": 2}),
        );
        cell
    }

    fn grade_id(cell: &Cell) -> Option<&str> {
        cell.metadata()
            .get("nbgrader")
            .and_then(|n| n.get("grade_id"))
            .and_then(Value::as_str)
    }

    #[test]
    fn only_grade_ids_change() {
        let mut nb = notebook_of(vec![graded_cell("q1"), Cell::code("x"), graded_cell("q2")]);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(reseed_notebook(&mut nb, &mut rng), 2);

        for cell in [&nb.cells[0], &nb.cells[2]] {
            let id = grade_id(cell).unwrap();
            assert!(id.parse::<u16>().is_ok(), "{id}");
            assert_eq!(cell.metadata()["nbgrader"]["points"], 2);
        }
        assert!(nb.cells[1].metadata().get("nbgrader").is_none());
    }

    #[test]
    fn same_seed_same_ids() {
        let mut a = notebook_of(vec![graded_cell("q1")]);
        let mut b = a.clone();
        reseed_notebook(&mut a, &mut StdRng::seed_from_u64(42));
        reseed_notebook(&mut b, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn directory_walk_rewrites_notebooks_and_skips_the_rest() {
        let dir = tempdir().unwrap();
        let nb_path = dir.path().join("lab1.ipynb");
        notebook_of(vec![graded_cell("dup")]).save(&nb_path).unwrap();
        fs::write(dir.path().join("README.md"), "# not a notebook").unwrap();
        let ckpt = dir.path().join(".ipynb_checkpoints").join("lab1-checkpoint.ipynb");
        fs::create_dir_all(ckpt.parent().unwrap()).unwrap();
        notebook_of(vec![graded_cell("dup")]).save(&ckpt).unwrap();

        let count =
            reseed_grade_ids(dir.path(), &mut StdRng::seed_from_u64(1), 1024 * 1024).unwrap();
        assert_eq!(count, 1);

        let rewritten = Notebook::load(&nb_path, 1024 * 1024).unwrap();
        assert!(grade_id(&rewritten.cells[0]).unwrap().parse::<u16>().is_ok());
        let untouched = Notebook::load(&ckpt, 1024 * 1024).unwrap();
        assert_eq!(grade_id(&untouched.cells[0]), Some("dup"));
        assert_eq!(
            fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "# not a notebook"
        );
    }
}
