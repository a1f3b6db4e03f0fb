//! # Filters
//!
//! Implementations of [`CellFilter`]:
//! - [`positional_filter`]: zip against the reference and keep cells whose
//!   reference counterpart carries a keep marker.
//! - [`tagged_filter`]: pair cells by the role identifier in their metadata.

pub mod positional_filter;
pub mod tagged_filter;

use crate::traits::filter::CellFilter;
use util::execution_config::{CellMatching, MarkingOptions};

/// The filter configured by the marking options.
pub fn from_options(options: &MarkingOptions) -> Box<dyn CellFilter> {
    match options.cell_matching {
        CellMatching::Positional => Box::new(positional_filter::PositionalFilter::new(
            options.keep_markers.iter().cloned(),
        )),
        CellMatching::Tagged => Box::new(tagged_filter::TaggedFilter),
    }
}
