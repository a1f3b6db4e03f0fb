use util::notebook::{Cell, Notebook};

/// Selects the answer cells of a submission.
///
/// Inclusion is decided from the reference only; implementations must never
/// look at the student's source to decide whether a cell is kept.
pub trait CellFilter: Send + Sync {
    fn filter(&self, submission: &Notebook, reference: &Notebook) -> Vec<Cell>;
}
