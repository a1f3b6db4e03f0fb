//! A comparator that performs an exact match between the reference text and
//! everything the student's cell printed.
//!
//! The textual outputs of the student's cell are concatenated in order, the
//! way a reader sees them under the cell, and compared against the expected
//! text. Trailing whitespace on either side is ignored; everything else must
//! be identical.

use crate::traits::comparator::{OutputComparator, texts, trivial_verdict};
use crate::types::Verdict;
use util::notebook::Output;

/// All-or-nothing comparator: the concatenated output must equal the expected text.
pub struct ExactComparator;

impl OutputComparator for ExactComparator {
    fn compare(&self, expected: Option<&str>, outputs: &[Output]) -> Verdict {
        let student = texts(outputs);
        if let Some(verdict) = trivial_verdict(expected, &student) {
            return verdict;
        }
        let expected = expected.unwrap_or_default();

        if student.concat().trim_end() == expected.trim_end() {
            Verdict::Matched
        } else {
            Verdict::WrongAnswer
        }
    }
}
