//! # Marker Library
//!
//! This module provides the core logic for grading notebook submissions against
//! a reference solution. It filters each submission down to its answer cells,
//! injects the test battery, runs the result in a sandbox, compares the
//! produced outputs with the reference's and aggregates a grade record.
//!
//! ## Key Concepts
//! - **GradingJob**: everything needed to grade one submission at a time against a fixed reference.
//! - **Filters**: pluggable strategies selecting the answer cells of a submission (positional, tagged).
//! - **Comparators**: pluggable strategies comparing student and reference outputs (substring, exact).
//! - **Batch**: directory discovery and the sequential run producing `grades.json` and `errors.txt`.

pub mod batch;
pub mod comparators;
pub mod error;
pub mod filters;
pub mod injector;
pub mod maintenance;
pub mod reference;
pub mod report;
pub mod scorer;
pub mod traits;
pub mod types;
pub mod utilities;

use crate::error::MarkerError;
use crate::injector::{TestBattery, inject};
use crate::reference::{ReferenceBundle, ReferenceQuestion};
use crate::report::GradeRecord;
use crate::scorer::ScoreCard;
use crate::traits::comparator::{OutputComparator, texts};
use crate::traits::filter::CellFilter;
use crate::types::QuestionResult;
use crate::utilities::file_loader::save_notebook;

use code_runner::{ExecutionMode, ExecutionRequest, Sandbox};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::time::Duration;
use util::execution_config::{CellMatching, ExecutionConfig};
use util::notebook::{Cell, Notebook, question_tag};
use util::paths::{ScratchDirs, write_atomic};

/// How one submission left the pipeline.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Executed and scored.
    Graded(GradeRecord),
    /// Could not be graded normally. `record` is what goes into the report,
    /// `reason` what goes into the error log.
    Rejected {
        record: GradeRecord,
        reason: MarkerError,
    },
}

impl SubmissionOutcome {
    pub fn record(&self) -> &GradeRecord {
        match self {
            SubmissionOutcome::Graded(record) => record,
            SubmissionOutcome::Rejected { record, .. } => record,
        }
    }

    pub fn into_record(self) -> GradeRecord {
        match self {
            SubmissionOutcome::Graded(record) => record,
            SubmissionOutcome::Rejected { record, .. } => record,
        }
    }
}

/// Grades submissions against one reference bundle and test battery.
///
/// The job holds no per-submission state, so one job grades a whole batch.
///
/// # Fields
/// - `bundle`: the reference, its clean expected outputs and the score table.
/// - `battery`: test cells injected around every filtered submission.
/// - `filter`: strategy selecting answer cells (from `marking.cell_matching`).
/// - `comparator`: strategy comparing outputs (from `marking.marking_scheme`).
/// - `expected_answer_cells`: how many cells a conforming filtered submission has.
pub struct GradingJob<'a> {
    bundle: &'a ReferenceBundle,
    battery: &'a TestBattery,
    config: ExecutionConfig,
    filter: Box<dyn CellFilter + 'a>,
    comparator: Box<dyn OutputComparator + 'a>,
    expected_answer_cells: usize,
}

impl<'a> GradingJob<'a> {
    /// Create a grading job with the filter and comparator named by `config`.
    ///
    /// # Errors
    /// [`MarkerError::InvalidReference`] when a clean-reference question sits
    /// outside the assembled notebook a conforming submission produces. This
    /// happens when the clean reference was extracted with a different battery
    /// or filter.
    pub fn new(
        bundle: &'a ReferenceBundle,
        battery: &'a TestBattery,
        config: ExecutionConfig,
    ) -> Result<Self, MarkerError> {
        let filter = filters::from_options(&config.marking);
        let comparator = comparators::for_scheme(config.marking.marking_scheme);
        let mut job = Self {
            bundle,
            battery,
            config,
            filter,
            comparator,
            expected_answer_cells: 0,
        };
        job.expected_answer_cells = job.derive_expected_answer_cells();
        job.check_positions()?;

        tracing::debug!(
            questions = job.bundle.clean().len(),
            expected_answer_cells = job.expected_answer_cells,
            total_points = job.bundle.total_points(),
            "grading job ready"
        );
        Ok(job)
    }

    /// Replace the cell filter. The expected answer-cell count is re-derived
    /// unless the config overrides it.
    pub fn with_filter<F: CellFilter + 'a>(mut self, filter: F) -> Self {
        self.filter = Box::new(filter);
        self.expected_answer_cells = self.derive_expected_answer_cells();
        self
    }

    /// Set a custom output comparator strategy for this grading job.
    pub fn with_comparator<C: OutputComparator + 'a>(mut self, comparator: C) -> Self {
        self.comparator = Box::new(comparator);
        self
    }

    fn derive_expected_answer_cells(&self) -> usize {
        self.config.marking.expected_answer_cells.unwrap_or_else(|| {
            let reference = self.bundle.reference();
            self.filter.filter(reference, reference).len()
        })
    }

    fn check_positions(&self) -> Result<(), MarkerError> {
        let assembled = self.battery.assembled_len(self.expected_answer_cells);
        match self
            .bundle
            .clean()
            .questions
            .iter()
            .find(|q| q.position >= assembled)
        {
            Some(q) => Err(MarkerError::InvalidReference(format!(
                "question {} is at cell {} but assembled submissions have {} cells",
                q.id, q.position, assembled
            ))),
            None => Ok(()),
        }
    }

    pub fn bundle(&self) -> &ReferenceBundle {
        self.bundle
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn expected_answer_cells(&self) -> usize {
        self.expected_answer_cells
    }

    /// Answer cells of `submission`, decided against the reference only.
    pub fn filter_submission(&self, submission: &Notebook) -> Vec<Cell> {
        self.filter.filter(submission, self.bundle.reference())
    }

    /// Grade one parsed submission.
    ///
    /// Per-submission failures (wrong cell count, sandbox failure) come back
    /// as [`SubmissionOutcome::Rejected`]. `Err` is reserved for failures to
    /// write the scratch artefacts.
    ///
    /// # Steps
    /// 1. Filters the submission and persists the filtered notebook.
    /// 2. Injects the battery; a wrong cell count stops here, before execution.
    /// 3. Persists the assembled notebook and executes it fault-tolerant.
    /// 4. Compares every reference question with the student's executed cell.
    /// 5. Persists the captured answers and aggregates the grade record.
    pub async fn grade(
        &self,
        student_id: &str,
        submission: &Notebook,
        context_dir: &Path,
        sandbox: &dyn Sandbox,
        scratch: &ScratchDirs,
    ) -> Result<SubmissionOutcome, MarkerError> {
        let filtered = self.filter_submission(submission);
        let mut filtered_doc = Notebook::empty();
        filtered_doc.cells = filtered.clone();
        save_notebook(&filtered_doc, &scratch.filtered_path(student_id))?;

        let assembled = match inject(
            filtered,
            self.battery,
            student_id,
            self.expected_answer_cells,
        ) {
            Ok(nb) => nb,
            Err(reason @ MarkerError::StructuralMismatch { .. }) => {
                tracing::info!(student = student_id, "{reason}");
                return Ok(SubmissionOutcome::Rejected {
                    record: GradeRecord::rejected(&reason),
                    reason,
                });
            }
            Err(other) => return Err(other),
        };
        save_notebook(&assembled, &scratch.assembled_path(student_id))?;

        let request = ExecutionRequest::new(
            Duration::from_secs(self.config.execution.timeout_secs),
            ExecutionMode::FaultTolerant,
            context_dir,
        )
        .with_label(student_id);

        let mut card = ScoreCard::new(self.config.marking.baseline_points);
        let questions = &self.bundle.clean().questions;

        let executed = match sandbox.execute(&assembled, &request).await {
            Ok(nb) => nb,
            Err(e) => {
                tracing::warn!(student = student_id, error = %e, "execution failed, forfeiting all questions");
                card.forfeit(questions);
                return Ok(SubmissionOutcome::Rejected {
                    record: card.finish(self.bundle.total_points()),
                    reason: MarkerError::ExecutionFault(e),
                });
            }
        };

        let results: Vec<QuestionResult> = questions
            .iter()
            .map(|q| self.compare_question(&executed, q))
            .collect();
        self.save_answers(student_id, &results, scratch)?;

        for result in results {
            card.record(result);
        }
        let record = card.finish(self.bundle.total_points());
        tracing::info!(
            student = student_id,
            score = record.score,
            "graded submission"
        );
        Ok(SubmissionOutcome::Graded(record))
    }

    fn locate<'n>(&self, executed: &'n Notebook, question: &ReferenceQuestion) -> Option<&'n Cell> {
        match self.config.marking.cell_matching {
            CellMatching::Positional => executed.cells.get(question.position),
            CellMatching::Tagged => executed
                .cells
                .iter()
                .find(|c| {
                    matches!(question_tag(c.metadata()), Ok(Some(tag)) if tag.id == question.id)
                })
                .or_else(|| executed.cells.get(question.position)),
        }
    }

    fn compare_question(&self, executed: &Notebook, question: &ReferenceQuestion) -> QuestionResult {
        let outputs = self
            .locate(executed, question)
            .map(Cell::outputs)
            .unwrap_or_default();
        let verdict = self
            .comparator
            .compare(question.expected.as_deref(), outputs);
        let answer = texts(outputs).concat();

        QuestionResult {
            question_id: question.id.clone(),
            points: self.bundle.points(&question.id),
            verdict,
            answer: (!answer.is_empty()).then_some(answer),
        }
    }

    fn save_answers(
        &self,
        student_id: &str,
        results: &[QuestionResult],
        scratch: &ScratchDirs,
    ) -> Result<(), MarkerError> {
        let answers: Map<String, Value> = results
            .iter()
            .map(|r| (r.question_id.clone(), json!({ "answer": r.answer })))
            .collect();
        let path = scratch.answers_path(student_id);
        let json = serde_json::to_string_pretty(&answers)
            .map_err(|e| MarkerError::InvalidJson(format!("Failed to serialize answers: {e}")))?;
        write_atomic(&path, json.as_bytes())
            .map_err(|e| MarkerError::IoError(format!("Failed to write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparators::exact_comparator::ExactComparator;
    use crate::filters::tagged_filter::TaggedFilter;
    use crate::reference::CleanReference;
    use code_runner::test_helpers::ScriptedSandbox;
    use std::fs;
    use util::notebook::Output;
    use util::score_table::ScoreTable;
    use util::test_helpers::{notebook_of, question_cell, temp_scratch, with_outputs};

    // Reference: [intro md, Q1, Q2]. Assembled: [preamble, identity, Q1, Q2, check].
    fn reference() -> Notebook {
        notebook_of(vec![
            Cell::markdown("# Lab 1"),
            question_cell("# Q1 (10 points)\nprint(2 + 3)", "Q1", 10.0),
            question_cell("# Q2 (10 points)\nprint(6 * 7)", "Q2", 10.0),
        ])
    }

    fn bundle() -> ReferenceBundle {
        let executed = notebook_of(vec![
            Cell::code("import helpers"),
            Cell::code("student_id = \"reference\""),
            with_outputs(question_cell("print(2 + 3)", "Q1", 10.0), vec![Output::stream("5\n")]),
            with_outputs(question_cell("print(6 * 7)", "Q2", 10.0), vec![Output::stream("42\n")]),
            Cell::code("check()"),
        ]);
        let clean = CleanReference::extract(&executed).unwrap();
        ReferenceBundle::new(reference(), clean, Some(ScoreTable::from_pairs([("Q1", 10.0), ("Q2", 10.0)])))
            .unwrap()
    }

    fn battery() -> TestBattery {
        TestBattery::new(vec![Cell::code("import helpers"), Cell::code("check()")]).unwrap()
    }

    fn submission(q1: &str, q2: &str) -> Notebook {
        notebook_of(vec![
            Cell::markdown("# Lab 1"),
            Cell::code(q1),
            Cell::code(q2),
        ])
    }

    #[test]
    fn expected_cells_come_from_reference() {
        let (bundle, battery) = (bundle(), battery());
        let job = GradingJob::new(&bundle, &battery, ExecutionConfig::default_config()).unwrap();
        assert_eq!(job.expected_answer_cells(), 2);
    }

    #[test]
    fn config_override_is_kept() {
        let (bundle, battery) = (bundle(), battery());
        let mut config = ExecutionConfig::default_config();
        config.marking.expected_answer_cells = Some(3);
        let job = GradingJob::new(&bundle, &battery, config)
            .unwrap()
            .with_filter(TaggedFilter);
        assert_eq!(job.expected_answer_cells(), 3);
    }

    #[test]
    fn positions_outside_assembled_shape_are_rejected() {
        let (bundle, battery) = (bundle(), battery());
        let mut config = ExecutionConfig::default_config();
        config.marking.expected_answer_cells = Some(0);
        let err = GradingJob::new(&bundle, &battery, config).err().unwrap();
        assert!(matches!(err, MarkerError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn grades_and_persists_scratch_files() {
        let (bundle, battery) = (bundle(), battery());
        let job = GradingJob::new(&bundle, &battery, ExecutionConfig::default_config()).unwrap();
        let (_tmp, scratch) = temp_scratch();
        let sandbox = ScriptedSandbox::new();

        let outcome = job
            .grade("alice", &submission("#> 5", "#> 41"), Path::new("."), &sandbox, &scratch)
            .await
            .unwrap();

        let record = outcome.record();
        assert_eq!(record.score, 50.0);
        assert_eq!(record.feedback, "Q2: wrong answer; ");

        assert!(scratch.filtered_path("alice").exists());
        assert!(scratch.assembled_path("alice").exists());
        let answers: Value =
            serde_json::from_str(&fs::read_to_string(scratch.answers_path("alice")).unwrap()).unwrap();
        assert_eq!(answers["Q1"]["answer"], "5\n");
        assert_eq!(answers["Q2"]["answer"], "41\n");

        let run = &sandbox.runs()[0];
        assert_eq!(run.mode, ExecutionMode::FaultTolerant);
        assert_eq!(run.label, "alice");
        assert_eq!(run.cell_count, 5);
    }

    #[tokio::test]
    async fn cell_fault_only_costs_that_question() {
        let (bundle, battery) = (bundle(), battery());
        let job = GradingJob::new(&bundle, &battery, ExecutionConfig::default_config()).unwrap();
        let (_tmp, scratch) = temp_scratch();

        let outcome = job
            .grade(
                "bob",
                &submission("#! raise NameError", "#> 42"),
                Path::new("."),
                &ScriptedSandbox::new(),
                &scratch,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Graded(_)));
        assert_eq!(outcome.record().score, 50.0);
        assert_eq!(outcome.record().feedback, "Q1: no output; ");
    }

    #[tokio::test]
    async fn exact_comparator_can_be_swapped_in() {
        let (bundle, battery) = (bundle(), battery());
        let job = GradingJob::new(&bundle, &battery, ExecutionConfig::default_config())
            .unwrap()
            .with_comparator(ExactComparator);
        let (_tmp, scratch) = temp_scratch();

        let outcome = job
            .grade(
                "carol",
                &submission("#> 5", "#> answer: 42"),
                Path::new("."),
                &ScriptedSandbox::new(),
                &scratch,
            )
            .await
            .unwrap();
        assert_eq!(outcome.record().feedback, "Q2: wrong answer; ");
    }

    #[tokio::test]
    async fn short_submission_is_rejected_without_execution() {
        let (bundle, battery) = (bundle(), battery());
        let job = GradingJob::new(&bundle, &battery, ExecutionConfig::default_config()).unwrap();
        let (_tmp, scratch) = temp_scratch();
        let sandbox = ScriptedSandbox::new();
        let short = notebook_of(vec![Cell::markdown("# Lab 1"), Cell::code("#> 5")]);

        let outcome = job
            .grade("dave", &short, Path::new("."), &sandbox, &scratch)
            .await
            .unwrap();

        match outcome {
            SubmissionOutcome::Rejected { record, reason } => {
                assert!(matches!(reason, MarkerError::StructuralMismatch { expected: 5, actual: 4 }));
                assert_eq!(record.score, 0.0);
                assert_eq!(record.feedback, "Incorrect number of cells: expected 5, got 4");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(sandbox.runs().is_empty());
    }

    #[tokio::test]
    async fn tagged_matching_finds_cells_by_question_id() {
        let (bundle, battery) = (bundle(), battery());
        let mut config = ExecutionConfig::default_config();
        config.marking.cell_matching = CellMatching::Tagged;
        let job = GradingJob::new(&bundle, &battery, config).unwrap();
        let (_tmp, scratch) = temp_scratch();

        // Reordered and padded with scratch work; tags still line the cells up.
        let submission = notebook_of(vec![
            question_cell("#> 42", "Q2", 10.0),
            Cell::code("#> scratch"),
            question_cell("#> 5", "Q1", 10.0),
        ]);

        let outcome = job
            .grade("erin", &submission, Path::new("."), &ScriptedSandbox::new(), &scratch)
            .await
            .unwrap();
        assert_eq!(outcome.record().score, 100.0);
        assert_eq!(outcome.record().feedback, "");
    }
}
