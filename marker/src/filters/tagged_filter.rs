//! Pairs submission cells with reference cells by the role identifier carried
//! in cell metadata instead of by position.
//!
//! The result follows the reference's order. An identifier missing from the
//! submission is simply absent from the result; when an identifier appears
//! more than once, the first cell wins. Roles come from
//! [`cell_roles`](util::notebook::cell_roles), so notebooks that only mark
//! answer cells with an `autograding` entry pair up by occurrence.

use crate::traits::filter::CellFilter;
use std::collections::HashSet;
use util::notebook::{Cell, Notebook, cell_roles};

#[derive(Default)]
pub struct TaggedFilter;

impl TaggedFilter {
    /// Role identifiers of the reference, in order, without duplicates.
    pub fn reference_roles(reference: &Notebook) -> Vec<String> {
        let mut seen = HashSet::new();
        cell_roles(&reference.cells)
            .into_iter()
            .flatten()
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }
}

impl CellFilter for TaggedFilter {
    fn filter(&self, submission: &Notebook, reference: &Notebook) -> Vec<Cell> {
        let submitted = cell_roles(&submission.cells);
        Self::reference_roles(reference)
            .iter()
            .filter_map(|role| {
                submitted
                    .iter()
                    .position(|r| r.as_deref() == Some(role.as_str()))
                    .map(|idx| submission.cells[idx].clone())
            })
            .collect()
    }
}
