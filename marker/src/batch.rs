//! Batch grading over a directory of submissions.
//!
//! Submissions are discovered with a sorted walk of the submission root and
//! graded one at a time. A failing submission is recorded in the report and
//! the run moves on; only failures on the run's own inputs or outputs stop it.

use crate::error::MarkerError;
use crate::report::{BatchReport, GradeRecord};
use crate::traits::filter::CellFilter;
use crate::utilities::file_loader::{load_notebook, save_notebook};
use crate::{GradingJob, SubmissionOutcome};
use code_runner::Sandbox;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use util::notebook::Notebook;
use util::paths::ScratchDirs;
use walkdir::WalkDir;

const NOTEBOOK_EXTENSION: &str = "ipynb";
const CHECKPOINT_MARKER: &str = "checkpoint";

/// A notebook found under the submission root.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// File stem of the notebook.
    pub student_id: String,
    pub path: PathBuf,
    /// Another file earlier in the walk already claimed this identifier.
    pub duplicate: bool,
}

/// Walk `root` in file-name order and list the notebooks to grade.
///
/// Paths with a component containing `checkpoint` are skipped, as are files
/// without the `.ipynb` extension.
pub fn discover(root: &Path) -> Result<Vec<Submission>, MarkerError> {
    if !root.is_dir() {
        return Err(MarkerError::IoError(format!(
            "Submission directory not found: {}",
            root.display()
        )));
    }

    let mut seen = HashSet::new();
    let mut submissions = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_name().to_string_lossy().contains(CHECKPOINT_MARKER)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(NOTEBOOK_EXTENSION) {
            continue;
        }
        let Some(student_id) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let duplicate = !seen.insert(student_id.clone());
        submissions.push(Submission {
            student_id,
            path: path.to_path_buf(),
            duplicate,
        });
    }

    Ok(submissions)
}

/// Runs a [`GradingJob`] over every submission under a root directory.
pub struct BatchRunner<'r, 'a> {
    job: &'r GradingJob<'a>,
    sandbox: &'r dyn Sandbox,
    scratch: ScratchDirs,
    max_notebook_bytes: u64,
    context_dir: Option<PathBuf>,
}

impl<'r, 'a> BatchRunner<'r, 'a> {
    pub fn new(job: &'r GradingJob<'a>, sandbox: &'r dyn Sandbox, scratch: ScratchDirs) -> Self {
        Self {
            max_notebook_bytes: job.config().execution.max_notebook_bytes,
            job,
            sandbox,
            scratch,
            context_dir: None,
        }
    }

    /// Execute every submission in `dir` instead of next to its own file.
    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = Some(dir.into());
        self
    }

    /// Grade every submission under `root` and return the assembled report.
    pub async fn run(&self, root: &Path) -> Result<BatchReport, MarkerError> {
        let submissions = discover(root)?;
        info!(
            count = submissions.len(),
            root = %root.display(),
            "starting grading run"
        );

        let mut report = BatchReport::new();
        for (idx, submission) in submissions.iter().enumerate() {
            info!(
                "[{}/{}] {}",
                idx + 1,
                submissions.len(),
                submission.path.display()
            );
            self.grade_one(submission, &mut report).await?;
        }

        info!(
            graded = report.len(),
            errors = report.errors.len(),
            "grading run finished"
        );
        Ok(report)
    }

    async fn grade_one(
        &self,
        submission: &Submission,
        report: &mut BatchReport,
    ) -> Result<(), MarkerError> {
        let path = &submission.path;
        if submission.duplicate {
            report.push_error(format!(
                "Duplicate student identifier {}: {} was not graded",
                submission.student_id,
                path.display()
            ));
            return Ok(());
        }

        let notebook = match load_notebook(path, self.max_notebook_bytes) {
            Ok(nb) => nb,
            Err(e) => {
                report.push_error(e.to_string());
                report.record(&submission.student_id, GradeRecord::invalid_file());
                return Ok(());
            }
        };

        let context_dir = self
            .context_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let outcome = self
            .job
            .grade(
                &submission.student_id,
                &notebook,
                &context_dir,
                self.sandbox,
                &self.scratch,
            )
            .await?;

        if let SubmissionOutcome::Rejected { reason, .. } = &outcome {
            report.push_error(error_line(reason, path));
        }
        report.record(&submission.student_id, outcome.into_record());
        Ok(())
    }
}

fn error_line(reason: &MarkerError, path: &Path) -> String {
    match reason {
        MarkerError::ExecutionFault(e) => {
            format!("Error executing the notebook \"{}\": {}", path.display(), e)
        }
        other => format!("{} ({})", other, path.display()),
    }
}

/// Result of a clean-only run.
#[derive(Debug, Default)]
pub struct CleanSummary {
    /// Identifiers whose filtered notebook was written.
    pub cleaned: Vec<String>,
    pub errors: Vec<String>,
}

/// Filter every submission under `root` against `reference` and persist the
/// filtered notebooks, without injecting or executing anything.
pub fn clean_submissions(
    root: &Path,
    reference: &Notebook,
    filter: &dyn CellFilter,
    scratch: &ScratchDirs,
    max_notebook_bytes: u64,
) -> Result<CleanSummary, MarkerError> {
    let mut summary = CleanSummary::default();

    for submission in discover(root)? {
        if submission.duplicate {
            summary.errors.push(format!(
                "Duplicate student identifier {}: {} was not cleaned",
                submission.student_id,
                submission.path.display()
            ));
            continue;
        }

        let notebook = match load_notebook(&submission.path, max_notebook_bytes) {
            Ok(nb) => nb,
            Err(e) => {
                warn!("{}", e);
                summary.errors.push(e.to_string());
                continue;
            }
        };

        let mut filtered = Notebook::empty();
        filtered.cells = filter.filter(&notebook, reference);
        save_notebook(&filtered, &scratch.filtered_path(&submission.student_id))?;
        info!(
            student = %submission.student_id,
            cells = filtered.cells.len(),
            "cleaned submission"
        );
        summary.cleaned.push(submission.student_id);
    }

    Ok(summary)
}
