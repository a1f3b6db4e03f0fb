//! # Comparators
//!
//! Implementations of [`OutputComparator`] for the configurable marking schemes:
//! - [`substring_comparator`]: expected text contained in any one output.
//! - [`exact_comparator`]: concatenated outputs equal the expected text.

pub mod exact_comparator;
pub mod substring_comparator;

use crate::traits::comparator::OutputComparator;
use util::execution_config::MarkingScheme;

/// The comparator configured for a marking scheme.
pub fn for_scheme(scheme: MarkingScheme) -> Box<dyn OutputComparator> {
    match scheme {
        MarkingScheme::Substring => Box::new(substring_comparator::SubstringComparator),
        MarkingScheme::Exact => Box::new(exact_comparator::ExactComparator),
    }
}
