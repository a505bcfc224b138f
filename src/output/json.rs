#![forbid(unsafe_code)]

//! Indented JSON output
//!
//! A single input prints its results as a bare array. Several inputs print
//! an array of `{"file": ..., "results": [...]}` objects in input order.

use super::Report;
use crate::rules::Namespace;
use serde::Serialize;

/// Indented JSON formatter
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        JsonFormatter
    }

    /// Format `reports`, ending with a newline
    ///
    /// # Errors
    ///
    /// Serialization failures from serde_json.
    pub fn format(&self, reports: &[Report]) -> Result<String, serde_json::Error> {
        let mut output = match reports {
            [single] => serde_json::to_string_pretty(&single.results)?,
            _ => {
                let records: Vec<FileRecord<'_>> = reports
                    .iter()
                    .map(|report| FileRecord {
                        file: &report.source,
                        results: &report.results,
                    })
                    .collect();
                serde_json::to_string_pretty(&records)?
            }
        };
        output.push('\n');
        Ok(output)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct FileRecord<'a> {
    file: &'a str,
    results: &'a [Namespace],
}
