//! # Scorer Module
//!
//! Accumulates per-question results for one submission into a [`GradeRecord`].
//!
//! The raw score starts at the configured baseline and grows by the points of
//! every matched question. At the end it is normalised against the total
//! points of the score table: `final = raw / (total / 100)`. The quotient is
//! stored unrounded and a baseline can take it above 100. A quotient within
//! float noise of 100 is stored as exactly 100.
//!
//! ## Degenerate submissions
//!
//! Every failure has a signature. A wrong answer's signature is its feedback
//! line, so it only repeats when the same question fails twice. A missing
//! output has the same signature whatever the question, so two questions with
//! no textual output at all repeat it. The first repeated signature collapses
//! the record to a score of 0 with the single feedback
//! [`INVALID_SUBMISSION`](crate::report::INVALID_SUBMISSION); partial credit
//! already earned is discarded and later results are ignored.

use crate::reference::ReferenceQuestion;
use crate::report::GradeRecord;
use crate::types::{QuestionResult, Verdict};
use std::collections::HashSet;

const MISSING_OUTPUT_SIGNATURE: &str = "no output";
const FULL_SCORE: f64 = 100.0;
const FULL_SCORE_TOLERANCE: f64 = 1e-9;

/// Normalise a raw score against the total achievable points.
pub fn normalise(raw: f64, total: f64) -> f64 {
    if !(total > 0.0) {
        return 0.0;
    }
    let score = raw / (total / 100.0);
    if (score - FULL_SCORE).abs() < FULL_SCORE_TOLERANCE {
        FULL_SCORE
    } else {
        score
    }
}

fn feedback_line(result: &QuestionResult) -> Option<(String, String)> {
    match result.verdict {
        Verdict::Matched => None,
        Verdict::WrongAnswer => {
            let line = format!("{}: wrong answer; ", result.question_id);
            Some((line.clone(), line))
        }
        Verdict::MissingOutput => Some((
            format!("{}: no output; ", result.question_id),
            MISSING_OUTPUT_SIGNATURE.to_string(),
        )),
    }
}

#[derive(Debug)]
pub struct ScoreCard {
    raw: f64,
    feedback: String,
    signatures: HashSet<String>,
    degenerate: bool,
}

impl ScoreCard {
    pub fn new(baseline: f64) -> Self {
        Self {
            raw: baseline,
            feedback: String::new(),
            signatures: HashSet::new(),
            degenerate: false,
        }
    }

    /// Add one question's result. Ignored once the card is degenerate.
    pub fn record(&mut self, result: QuestionResult) {
        if self.degenerate {
            return;
        }

        if let Some((line, signature)) = feedback_line(&result) {
            if !self.signatures.insert(signature) {
                tracing::debug!(question = %result.question_id, "repeated failure signature");
                self.degenerate = true;
                return;
            }
            self.feedback.push_str(&line);
        }

        self.raw += result.awarded();
    }

    /// Record every question as a wrong answer. Used when the document could
    /// not be executed at all.
    pub fn forfeit<'q>(&mut self, questions: impl IntoIterator<Item = &'q ReferenceQuestion>) {
        for q in questions {
            self.record(QuestionResult {
                question_id: q.id.clone(),
                points: q.points,
                verdict: Verdict::WrongAnswer,
                answer: None,
            });
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    pub fn finish(self, total_points: f64) -> GradeRecord {
        if self.degenerate {
            return GradeRecord::invalid_submission();
        }
        GradeRecord {
            score: normalise(self.raw, total_points),
            feedback: self.feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::INVALID_SUBMISSION;

    fn result(id: &str, points: f64, verdict: Verdict) -> QuestionResult {
        QuestionResult {
            question_id: id.into(),
            points,
            verdict,
            answer: None,
        }
    }

    #[test]
    fn two_of_three_is_two_thirds() {
        let mut card = ScoreCard::new(0.0);
        card.record(result("Q1", 10.0, Verdict::Matched));
        card.record(result("Q2", 10.0, Verdict::WrongAnswer));
        card.record(result("Q3", 10.0, Verdict::Matched));

        let record = card.finish(30.0);
        assert_eq!(record.score, 200.0 / 3.0);
        assert_eq!(record.feedback, "Q2: wrong answer; ");
    }

    #[test]
    fn all_matched_is_exactly_one_hundred() {
        let mut card = ScoreCard::new(0.0);
        for id in ["Q1", "Q2", "Q3", "Q4", "Q5", "Q6", "Q7"] {
            card.record(result(id, 3.3, Verdict::Matched));
        }
        let record = card.finish(3.3 * 7.0);
        assert_eq!(record.score, 100.0);
        assert!(record.feedback.is_empty());
    }

    #[test]
    fn baseline_is_part_of_the_raw_score() {
        let mut card = ScoreCard::new(20.0);
        card.record(result("Q1", 10.0, Verdict::WrongAnswer));
        assert_eq!(card.finish(100.0).score, 20.0);

        let mut card = ScoreCard::new(5.0);
        card.record(result("Q1", 20.0, Verdict::Matched));
        assert_eq!(card.finish(20.0).score, 125.0);
    }

    #[test]
    fn distinct_wrong_answers_do_not_collapse() {
        let mut card = ScoreCard::new(0.0);
        card.record(result("Q1", 10.0, Verdict::WrongAnswer));
        card.record(result("Q2", 10.0, Verdict::WrongAnswer));
        assert!(!card.is_degenerate());
        let record = card.finish(20.0);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.feedback, "Q1: wrong answer; Q2: wrong answer; ");
    }

    #[test]
    fn repeated_missing_output_collapses() {
        let mut card = ScoreCard::new(0.0);
        card.record(result("Q1", 10.0, Verdict::Matched));
        card.record(result("Q2", 10.0, Verdict::MissingOutput));
        card.record(result("Q3", 10.0, Verdict::MissingOutput));
        card.record(result("Q4", 10.0, Verdict::Matched));

        assert!(card.is_degenerate());
        let record = card.finish(40.0);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.feedback, INVALID_SUBMISSION);
    }

    #[test]
    fn repeated_identical_line_collapses() {
        let mut card = ScoreCard::new(0.0);
        card.record(result("Q1", 10.0, Verdict::WrongAnswer));
        card.record(result("Q1", 10.0, Verdict::WrongAnswer));
        assert!(card.is_degenerate());
    }

    #[test]
    fn single_missing_output_is_just_feedback() {
        let mut card = ScoreCard::new(0.0);
        card.record(result("Q1", 10.0, Verdict::MissingOutput));
        card.record(result("Q2", 10.0, Verdict::Matched));
        let record = card.finish(20.0);
        assert_eq!(record.score, 50.0);
        assert_eq!(record.feedback, "Q1: no output; ");
    }

    #[test]
    fn forfeit_marks_every_question_wrong() {
        let questions = vec![
            ReferenceQuestion { id: "Q1".into(), points: 10.0, position: 2, expected: Some("5".into()) },
            ReferenceQuestion { id: "Q2".into(), points: 10.0, position: 3, expected: Some("6".into()) },
        ];
        let mut card = ScoreCard::new(0.0);
        card.forfeit(&questions);
        let record = card.finish(20.0);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.feedback, "Q1: wrong answer; Q2: wrong answer; ");
    }

    #[test]
    fn normalise_guards_zero_total() {
        assert_eq!(normalise(10.0, 0.0), 0.0);
        assert_eq!(normalise(20.0, 30.0), 20.0 / (30.0 / 100.0));
        assert_eq!(normalise(-5.0, 10.0), -50.0);
    }
}
