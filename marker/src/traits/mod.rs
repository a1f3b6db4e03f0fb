//!
//! Traits Module
//!
//! Extension points of the grading pipeline.
//!
//! - [`comparator`]: decides whether a student's cell outputs match the expected text.
//! - [`filter`]: selects the answer cells of a submission against the reference.

pub mod comparator;
pub mod filter;
