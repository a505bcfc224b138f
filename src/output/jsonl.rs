#![forbid(unsafe_code)]

//! JSONL output formatter for machine-readable output
//!
//! One JSON object per result, in input order and then result order:
//! `{"file": ..., "index": n, "result": {...}}`.

use super::Report;
use crate::rules::Namespace;
use serde::Serialize;

/// JSONL output formatter
pub struct JsonlFormatter;

impl JsonlFormatter {
    pub fn new() -> Self {
        JsonlFormatter
    }

    /// Format `reports` as JSON Lines
    ///
    /// # Errors
    ///
    /// Serialization failures from serde_json.
    pub fn format(&self, reports: &[Report]) -> Result<String, serde_json::Error> {
        let mut output = String::new();
        for report in reports {
            for (index, result) in report.results.iter().enumerate() {
                let record = ResultRecord {
                    file: &report.source,
                    index,
                    result,
                };
                output.push_str(&serde_json::to_string(&record)?);
                output.push('\n');
            }
        }
        Ok(output)
    }
}

impl Default for JsonlFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Result record for JSONL output
#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    file: &'a str,
    index: usize,
    result: &'a Namespace,
}
