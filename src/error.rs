use std::result;

use thiserror::Error;

/// Errors raised while constructing stores.
///
/// Propagation itself is infallible: once a derived store exists, rounds
/// either complete or unwind with the panic of a derive function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A derived store was given an empty dependency list.
    #[error("derived store needs at least one dependency, got none")]
    NoDependencies,

    /// A runtime-assembled dependency list has a hole.
    #[error("derived store expects stores as input, got nothing at index {index}")]
    MissingDependency {
        /// Position of the missing entry in the dependency list
        index: usize,
    },
}

/// A specialized `Result` type for store construction.
pub type Result<T> = result::Result<T, StoreError>;
