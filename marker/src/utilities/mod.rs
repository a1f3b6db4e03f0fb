//! # Utilities
//!
//! Helpers shared across the `marker` crate.
//!
//! - [`file_loader`]: checked loading of notebooks and JSON side files.

pub mod file_loader;
