//! # Types Module
//!
//! Per-question results produced by comparing an executed submission against
//! the clean reference.

use serde::Serialize;

/// Outcome of comparing one question cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Matched,
    /// The cell produced text, but not the expected text.
    WrongAnswer,
    /// The cell produced no textual output at all (never ran, only errors or images).
    MissingOutput,
}

/// The graded result of a single question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub question_id: String,
    /// Points available for the question.
    pub points: f64,
    pub verdict: Verdict,
    /// Every textual output of the student's cell, concatenated.
    pub answer: Option<String>,
}

impl QuestionResult {
    pub fn awarded(&self) -> f64 {
        match self.verdict {
            Verdict::Matched => self.points,
            _ => 0.0,
        }
    }
}
