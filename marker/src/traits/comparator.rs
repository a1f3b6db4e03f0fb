use crate::types::Verdict;
use util::notebook::Output;

/// OutputComparator is a strategy trait for comparing outputs.
/// Each implementation decides whether the outputs of one executed student
/// cell satisfy the expected text taken from the reference cell.
pub trait OutputComparator: Send + Sync {
    /// - `expected`: first textual output of the reference cell, `None` when
    ///   the reference cell printed nothing.
    /// - `outputs`: the student's cell outputs, in order.
    fn compare(&self, expected: Option<&str>, outputs: &[Output]) -> Verdict;
}

/// Textual representations of `outputs`, skipping outputs without one.
pub fn texts(outputs: &[Output]) -> Vec<String> {
    outputs.iter().filter_map(Output::text).collect()
}

/// Shared handling of the "nothing to compare" cases. Returns `None` when
/// both sides have text and the scheme has to decide.
pub fn trivial_verdict(expected: Option<&str>, student_texts: &[String]) -> Option<Verdict> {
    match (expected, student_texts.is_empty()) {
        (None, true) => Some(Verdict::Matched),
        (None, false) => Some(Verdict::WrongAnswer),
        (Some(_), true) => Some(Verdict::MissingOutput),
        (Some(_), false) => None,
    }
}
