use crate::config::AppConfig;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Ensure the parent directory of a *file path* exists (no-op if none).
pub fn ensure_parent_dir<P: AsRef<Path>>(file_path: P) -> io::Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write `bytes` to `path` through a sibling temp file and a rename, creating parents.
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let tmp = temp_path(path);
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.flush()?;
    }
    fs::rename(&tmp, path)
}

fn temp_path(final_path: &Path) -> PathBuf {
    let mut tmp = final_path.to_path_buf();
    let fname = final_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    tmp.set_file_name(format!("{fname}.tmp"));
    tmp
}

/// Resolve a possibly relative directory against the current working directory.
fn resolve(root: &str) -> PathBuf {
    let p = PathBuf::from(root);
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

/// Scratch root (absolute), from `AppConfig::scratch_root`.
pub fn scratch_root() -> PathBuf {
    resolve(&AppConfig::global().scratch_root)
}

/// Report root (absolute), from `AppConfig::output_root`.
pub fn output_root() -> PathBuf {
    resolve(&AppConfig::global().output_root)
}

/// Layout of the per-run scratch directory.
///
/// Every per-submission file name is derived from the student identifier, so
/// sequential runs over the same batch overwrite rather than collide.
#[derive(Debug, Clone)]
pub struct ScratchDirs {
    root: PathBuf,
}

impl ScratchDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scratch layout rooted at the configured scratch root.
    pub fn from_config() -> Self {
        Self::new(scratch_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─── Filtered submissions ──────────────────────────────
    pub fn filtered_dir(&self) -> PathBuf {
        self.root.join("filtered")
    }
    pub fn filtered_path(&self, student_id: &str) -> PathBuf {
        self.filtered_dir().join(format!("{student_id}_clean.ipynb"))
    }

    // ─── Assembled (filtered + battery) notebooks ──────────
    pub fn assembled_dir(&self) -> PathBuf {
        self.root.join("assembled")
    }
    pub fn assembled_path(&self, student_id: &str) -> PathBuf {
        self.assembled_dir().join(format!("{student_id}.ipynb"))
    }

    // ─── Captured answers ──────────────────────────────────
    pub fn answers_dir(&self) -> PathBuf {
        self.root.join("students")
    }
    pub fn answers_path(&self, student_id: &str) -> PathBuf {
        self.answers_dir().join(format!("{student_id}.json"))
    }

    // ─── Reference run ─────────────────────────────────────
    pub fn reference_executed_path(&self) -> PathBuf {
        self.root.join("reference_executed.ipynb")
    }
    pub fn clean_reference_path(&self) -> PathBuf {
        self.root.join("reference_clean.json")
    }
}

/// Final grade report inside a report directory.
pub fn grades_path(output_dir: &Path) -> PathBuf {
    output_dir.join("grades.json")
}

/// Final error log inside a report directory.
pub fn errors_path(output_dir: &Path) -> PathBuf {
    output_dir.join("errors.txt")
}
