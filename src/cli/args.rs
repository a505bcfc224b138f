//! CLI argument parsing using clap

use crate::types::{Format, ParserOptions};
use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON
    Json,
    /// JSON Lines format (one JSON object per result)
    Jsonl,
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Automatically detect if terminal supports color
    Auto,
    /// Always use color
    Always,
    /// Never use color
    Never,
}

/// Spork CLI main entry point
#[derive(Parser, Debug)]
#[command(name = "spork")]
#[command(about = "Spork is a mark-up scanning and processing language")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub program: ProgramSource,

    /// Warn of program parsing errors
    #[arg(short, long)]
    pub warn: bool,

    /// Attempt XML parsing of documents
    #[arg(short = 'X', long)]
    pub xml: bool,

    /// Attempt HTML parsing of documents
    #[arg(short = 'H', long)]
    pub html: bool,

    /// Process selected elements from each document
    #[arg(short, long, value_name = "SELECTOR")]
    pub select: Option<String>,

    /// Print result(s)
    #[arg(short, long)]
    pub print: bool,

    /// Display debugging information
    #[arg(short, long)]
    pub debug: bool,

    /// Output format used with --print
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Output coloring
    #[arg(long)]
    pub color: Option<ColorChoice>,

    /// Configuration file (defaults to ./spork.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub parser: ParserFlags,

    /// Documents or directories to process (default: stdin)
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,
}

/// Where the program text comes from
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ProgramSource {
    /// Filename of Spork program
    #[arg(short = 'f', long = "file", value_name = "PROGFILE")]
    pub file: Option<PathBuf>,

    /// Text of Spork program
    #[arg(short = 'e', long = "source", value_name = "PROGRAM-TEXT")]
    pub source: Option<String>,
}

/// Document parser options
#[derive(Args, Debug, Default)]
#[command(next_help_heading = "Document parser options")]
pub struct ParserFlags {
    /// Read the DTD (if referenced by the document) and add the default attributes from it
    #[arg(long)]
    pub attribute_defaults: bool,

    /// Validate while parsing (if a DTD was referenced)
    #[arg(long)]
    pub dtd_validation: bool,

    /// Allow network access when looking up external documents
    #[arg(long)]
    pub allow_network: bool,

    /// Try hard to parse through broken XML
    #[arg(long)]
    pub recover: bool,

    /// Discard blank text nodes (ignorable whitespace) between tags
    #[arg(long)]
    pub remove_blank_text: bool,

    /// Don't replace CDATA sections by normal text content
    #[arg(long)]
    pub leave_cdata: bool,

    /// Don't replace entities by their text value
    #[arg(long)]
    pub leave_entities: bool,

    /// Don't collect XML IDs (can speed up parsing if IDs not used)
    #[arg(long)]
    pub forget_ids: bool,

    /// Support deep trees and very long text content. WARNING: disables security restrictions
    #[arg(long)]
    pub huge_tree: bool,
}

impl ParserFlags {
    pub fn options(&self) -> ParserOptions {
        ParserOptions {
            attribute_defaults: self.attribute_defaults,
            dtd_validation: self.dtd_validation,
            allow_network: self.allow_network,
            recover: self.recover,
            remove_blank_text: self.remove_blank_text,
            leave_cdata: self.leave_cdata,
            leave_entities: self.leave_entities,
            forget_ids: self.forget_ids,
            huge_tree: self.huge_tree,
        }
    }
}

impl Cli {
    /// Formats requested by `-X`/`-H`, if any
    ///
    /// When both are given the last one wins, as `-H` is applied after `-X`.
    pub fn formats(&self) -> Option<Vec<Format>> {
        if self.html {
            Some(vec![Format::Html])
        } else if self.xml {
            Some(vec![Format::Xml])
        } else {
            None
        }
    }
}
