//! CLI argument parsing and the `spork` command

pub mod args;
pub mod common;
pub mod run;

pub use args::{Cli, ColorChoice, OutputFormat};
pub use run::run;
