//! Program loading, runs and document discovery

pub mod evaluator;
pub mod executor;
pub mod file_walker;
pub mod selection;

pub use executor::{EngineOptions, Spork, UNCONDITIONAL};
pub use selection::Selection;
