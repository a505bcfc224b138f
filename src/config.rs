//! Configuration file parsing and validation

pub mod spork_toml;

pub use spork_toml::{CONFIG_FILE, ColorOption, Config, DocumentConfig, OutputConfig, OutputFormat};
