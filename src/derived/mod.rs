//! Derived stores.
//!
//! A derived store subscribes to its dependencies only while it has
//! subscribers of its own. Each propagation round is counted through a
//! barrier: dependencies announce an upcoming change by invalidating, and
//! the derive function runs once the last announced change has settled.
//! Diamond-shaped graphs therefore recompute once per root update and never
//! expose a half-updated combination of inputs.

mod dependencies;
mod derived;

pub use dependencies::Dependencies;
pub use derived::{create_derived, create_derived_with_initial, create_derived_with_setter};
