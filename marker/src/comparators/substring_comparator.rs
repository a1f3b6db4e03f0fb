//! A comparator that awards a question when the expected text appears inside
//! any one of the student's outputs.
//!
//! Containment runs one way only: the reference text must be found in the
//! student's output. Extra prefixes, suffixes and surrounding whitespace in the
//! student's printout are tolerated.

use crate::traits::comparator::{OutputComparator, texts, trivial_verdict};
use crate::types::Verdict;
use util::notebook::Output;

pub struct SubstringComparator;

impl OutputComparator for SubstringComparator {
    /// Scans the student's outputs in order and matches on the first one
    /// that contains `expected`.
    fn compare(&self, expected: Option<&str>, outputs: &[Output]) -> Verdict {
        let student = texts(outputs);
        if let Some(verdict) = trivial_verdict(expected, &student) {
            return verdict;
        }
        let expected = expected.unwrap_or_default();

        if student.iter().any(|text| text.contains(expected)) {
            Verdict::Matched
        } else {
            Verdict::WrongAnswer
        }
    }
}
