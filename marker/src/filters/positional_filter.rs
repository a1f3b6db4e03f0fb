//! Keeps the submission cells whose positional counterpart in the reference is
//! a code cell containing one of the keep markers.
//!
//! Cells are zipped by index. A submission shorter than the reference is
//! truncated silently; the injector's cell-count check catches the shortfall.

use crate::traits::filter::CellFilter;
use util::execution_config::MarkingOptions;
use util::notebook::{Cell, Notebook};

pub struct PositionalFilter {
    markers: Vec<String>,
}

impl PositionalFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    fn keeps(&self, reference_cell: &Cell) -> bool {
        reference_cell.is_code()
            && self
                .markers
                .iter()
                .any(|m| reference_cell.source().contains(m.as_str()))
    }
}

impl Default for PositionalFilter {
    fn default() -> Self {
        Self::new(MarkingOptions::default().keep_markers)
    }
}

impl CellFilter for PositionalFilter {
    fn filter(&self, submission: &Notebook, reference: &Notebook) -> Vec<Cell> {
        submission
            .cells
            .iter()
            .zip(reference.cells.iter())
            .filter(|(_, reference_cell)| self.keeps(reference_cell))
            .map(|(cell, _)| cell.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use util::notebook::TextCell;
    use util::test_helpers::notebook_of;

    fn reference() -> Notebook {
        notebook_of(vec![
            Cell::markdown("# Lab 2 (10 points)"),
            Cell::code("import numpy as np"),
            Cell::code("scratch = 1"),
            Cell::code("# Q1 (10 points)\n"),
            Cell::code("# don't change this cell\nassert f(2) == 4"),
        ])
    }

    #[test]
    fn keeps_cells_by_reference_markers() {
        let submission = notebook_of(vec![
            Cell::markdown("intro"),
            Cell::code("import pandas"),
            Cell::code("points = 'not a marker here'"),
            Cell::code("answer = 42\nprint(answer)"),
            Cell::code("assert True"),
        ]);

        let kept = PositionalFilter::default().filter(&submission, &reference());
        let sources: Vec<&str> = kept.iter().map(Cell::source).collect();
        assert_eq!(
            sources,
            vec!["import pandas", "answer = 42\nprint(answer)", "assert True"]
        );
    }

    #[test]
    fn markdown_reference_cells_are_never_kept() {
        let submission = notebook_of(vec![Cell::code("x = 1")]);
        let reference = notebook_of(vec![Cell::markdown("import this (10 points)")]);
        assert!(PositionalFilter::default().filter(&submission, &reference).is_empty());
    }

    #[test]
    fn student_source_does_not_change_the_size() {
        let a = notebook_of(vec![
            Cell::code("x"),
            Cell::code("import os"),
            Cell::code("y"),
            Cell::code("z"),
            Cell::code("w"),
        ]);
        let b = notebook_of(vec![
            Cell::markdown("points assert import"),
            Cell::code(""),
            Cell::code("definition"),
            Cell::code("print('hello')"),
            Cell::Raw(TextCell {
                source: "raw".into(),
                ..TextCell::default()
            }),
        ]);
        let filter = PositionalFilter::default();
        assert_eq!(
            filter.filter(&a, &reference()).len(),
            filter.filter(&b, &reference()).len()
        );
    }

    #[test]
    fn short_submission_truncates() {
        let submission = notebook_of(vec![Cell::code("a"), Cell::code("b")]);
        let kept = PositionalFilter::default().filter(&submission, &reference());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source(), "b");
    }

    #[test]
    fn markers_are_configurable() {
        let filter = PositionalFilter::new(["scratch"]);
        let submission = notebook_of(vec![
            Cell::code("a"),
            Cell::code("b"),
            Cell::code("c"),
        ]);
        let kept = filter.filter(&submission, &reference());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source(), "c");
    }
}
