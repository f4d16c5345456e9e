//! Difference engine for lyst.
//!
//! Computes the minimal edit script transforming one ordered sequence of
//! entries into another, driven by identity-key alignment (Myers diff) with
//! content checks on aligned pairs and optional move detection.
//!
//! # Key Types
//!
//! - [`EditScript`] / [`EditOp`] -- Ordered sequence of structural operations
//! - [`compute_edit_script`] -- Diff two entry sequences into an edit script

pub mod engine;
pub mod script;

pub use engine::compute_edit_script;
pub use script::{EditOp, EditScript};
