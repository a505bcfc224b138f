//! Parsing and validation for spork.toml configuration files

use crate::error::ConfigError;
use crate::types::{Format, ParserOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name looked up in the working directory
pub const CONFIG_FILE: &str = "spork.toml";

/// Main configuration struct for spork.toml
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Document discovery and format settings
    #[serde(default)]
    pub document: DocumentConfig,

    /// Options forwarded to the document parser
    #[serde(default)]
    pub parser: ParserOptions,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load `path` when given, else `./spork.toml` when present, else defaults
    ///
    /// # Errors
    ///
    /// An explicit path that cannot be read, or an invalid file.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).is_file() => {
                log::debug!("using {}", CONFIG_FILE);
                Self::load(CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.document.formats.is_empty() {
            return Err(ConfigError::Validation(
                "No document formats configured. Set [document] formats to \"xml\", \"html\" or both."
                    .to_string(),
            ));
        }

        for (kind, patterns) in [
            ("include", &self.document.include),
            ("exclude", &self.document.exclude),
        ] {
            for pattern in patterns {
                globset::Glob::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!(
                        "Invalid {} glob pattern '{}': {}",
                        kind, pattern, e
                    ))
                })?;
            }
        }

        Ok(())
    }
}

/// `[document]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentConfig {
    /// Formats to try, in order
    #[serde(default = "Format::default_order")]
    pub formats: Vec<Format>,

    /// Files to pick up when walking a directory
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Files to leave out when walking a directory
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            formats: Format::default_order(),
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

fn default_include() -> Vec<String> {
    ["**/*.xml", "**/*.html", "**/*.htm", "**/*.xhtml"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[output]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Color output setting
    #[serde(default)]
    pub color: ColorOption,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented JSON array of results per input
    #[default]
    Json,
    /// One compact JSON object per result
    Jsonl,
}

/// Color output options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorOption {
    /// Auto-detect based on terminal capabilities
    #[default]
    Auto,
    /// Always use color
    Always,
    /// Never use color
    Never,
}
