//! Reference solution handling.
//!
//! The reference notebook goes through the same filter and injection as a
//! submission, runs in fault-strict mode, and the expected answers are read
//! off the executed copy. Because a correctly assembled submission has the
//! same shape, a question's `position` in the executed reference is also its
//! position in every executed submission.

use crate::error::MarkerError;
use crate::injector::{TestBattery, inject};
use crate::traits::filter::CellFilter;
use crate::utilities::file_loader::load_json;
use code_runner::{ExecutionMode, ExecutionRequest, Sandbox};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use util::notebook::{Notebook, question_tag};
use util::paths::write_atomic;
use util::score_table::ScoreTable;

/// Identity written into the reference run's identity cell.
pub const REFERENCE_IDENTITY: &str = "reference";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceQuestion {
    pub id: String,
    pub points: f64,
    /// Cell index in the executed assembled notebook.
    pub position: usize,
    /// First textual output of the reference cell.
    pub expected: Option<String>,
}

/// Ordered question cells of the executed reference with their expected text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanReference {
    pub questions: Vec<ReferenceQuestion>,
}

impl CleanReference {
    /// Read the question cells off an executed reference notebook.
    pub fn extract(executed: &Notebook) -> Result<Self, MarkerError> {
        let mut questions = Vec::new();
        let mut seen = HashSet::new();

        for (position, cell) in executed.cells.iter().enumerate() {
            let tag = question_tag(cell.metadata())
                .map_err(|e| MarkerError::InvalidReference(format!("cell {position}: {e}")))?;
            let Some(tag) = tag else { continue };

            if !seen.insert(tag.id.clone()) {
                return Err(MarkerError::InvalidReference(format!(
                    "question {} appears more than once",
                    tag.id
                )));
            }

            let expected = cell.outputs().iter().find_map(|o| o.text());
            if expected.is_none() {
                tracing::warn!(question = %tag.id, "reference cell produced no text; expecting silence");
            }

            questions.push(ReferenceQuestion {
                id: tag.id,
                points: tag.points,
                position,
                expected,
            });
        }

        Ok(Self { questions })
    }

    pub fn load(path: &Path) -> Result<Self, MarkerError> {
        load_json(path, "clean reference")
    }

    pub fn save(&self, path: &Path) -> Result<(), MarkerError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MarkerError::InvalidJson(format!("Failed to serialize clean reference: {e}")))?;
        write_atomic(path, json.as_bytes())
            .map_err(|e| MarkerError::IoError(format!("Failed to write {}: {e}", path.display())))
    }

    /// Score table built from the points declared in question metadata.
    pub fn declared_scores(&self) -> ScoreTable {
        ScoreTable::from_pairs(self.questions.iter().map(|q| (q.id.clone(), q.points)))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Filter the reference against itself, inject the battery and execute it
/// fault-strict. Any cell fault fails the run.
pub async fn run_reference(
    reference: &Notebook,
    battery: &TestBattery,
    filter: &dyn CellFilter,
    sandbox: &dyn Sandbox,
    request: &ExecutionRequest,
) -> Result<Notebook, MarkerError> {
    let filtered = filter.filter(reference, reference);
    let answer_cells = filtered.len();
    tracing::info!(answer_cells, battery = battery.len(), "running reference solution");

    let assembled = inject(filtered, battery, REFERENCE_IDENTITY, answer_cells)?;

    let strict = ExecutionRequest {
        mode: ExecutionMode::FaultStrict,
        ..request.clone()
    };
    let executed = sandbox.execute(&assembled, &strict).await?;
    Ok(executed)
}

/// Everything a grading run needs to know about the reference. Read-only
/// once built.
#[derive(Debug, Clone)]
pub struct ReferenceBundle {
    reference: Notebook,
    clean: CleanReference,
    scores: ScoreTable,
}

impl ReferenceBundle {
    /// `scores` falls back to the points declared in question metadata.
    ///
    /// # Errors
    ///
    /// [`MarkerError::WeightMismatch`] when a question has no score entry or
    /// the table's total is not positive.
    pub fn new(
        reference: Notebook,
        clean: CleanReference,
        scores: Option<ScoreTable>,
    ) -> Result<Self, MarkerError> {
        let scores = scores.unwrap_or_else(|| clean.declared_scores());

        let missing: Vec<&str> = clean
            .questions
            .iter()
            .filter(|q| scores.points(&q.id).is_none())
            .map(|q| q.id.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(MarkerError::WeightMismatch(format!(
                "no score for question(s) {}",
                missing.join(", ")
            )));
        }

        let total = scores.total();
        if !(total > 0.0) {
            return Err(MarkerError::WeightMismatch(format!(
                "total points must be positive, got {total}"
            )));
        }

        let known: HashSet<&str> = clean.questions.iter().map(|q| q.id.as_str()).collect();
        for (id, _) in scores.iter().filter(|(id, _)| !known.contains(id)) {
            tracing::warn!(question = id, "score table entry has no matching reference question");
        }

        Ok(Self {
            reference,
            clean,
            scores,
        })
    }

    pub fn reference(&self) -> &Notebook {
        &self.reference
    }

    pub fn clean(&self) -> &CleanReference {
        &self.clean
    }

    pub fn scores(&self) -> &ScoreTable {
        &self.scores
    }

    /// Points of a question from the score table.
    pub fn points(&self, question_id: &str) -> f64 {
        self.scores.points(question_id).unwrap_or(0.0)
    }

    /// Sum of the score table.
    pub fn total_points(&self) -> f64 {
        self.scores.total()
    }
}
