//! The `spork` command
//!
//! This module:
//! - Loads spork.toml (when present) and merges it with the flags
//! - Loads the program from `-f` or `-e`
//! - Discovers input documents
//! - Runs the program over each document in parallel
//! - Prints the results in input order when `-p` is given
//! - Returns the exit code

use crate::cli::args::{Cli, ColorChoice, OutputFormat};
use crate::cli::common::{
    EXIT_ERROR, EXIT_EVAL_ERROR, EXIT_SCRIPT_ERROR, EXIT_SUCCESS, Input, discover_inputs,
    print_error,
};
use crate::config::{self, Config};
use crate::document;
use crate::engine::file_walker::FileWalkerError;
use crate::engine::{EngineOptions, Spork};
use crate::error::{ConfigError, SporkError};
use crate::output::{JsonFormatter, JsonlFormatter, Report};
use crate::types::ParserOptions;
use rayon::prelude::*;
use std::fs;
use std::io::{self, Read, Write};

/// Error type specific to the run command
#[derive(Debug, thiserror::Error)]
pub(crate) enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Spork(#[from] SporkError),

    #[error("File walker error: {0}")]
    FileWalker(#[from] FileWalkerError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to format output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Write(#[source] io::Error),
}

impl RunError {
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            RunError::Spork(SporkError::Script(_) | SporkError::Selector(_)) => EXIT_SCRIPT_ERROR,
            RunError::Spork(SporkError::Eval(_)) => EXIT_EVAL_ERROR,
            _ => EXIT_ERROR,
        }
    }
}

/// Settings resolved from the flags and the configuration file
struct Settings {
    parser: ParserOptions,
    format: OutputFormat,
    color: ColorChoice,
}

/// Run the command described by `cli`, returning the exit code
///
/// Exit code:
/// - 0: Success
/// - 1: Evaluation error
/// - 2: I/O, configuration or document error
/// - 3: Script or selector error
pub fn run(cli: &Cli) -> i32 {
    let mut color = cli.color.unwrap_or(ColorChoice::Auto);
    match run_inner(cli, &mut color) {
        Ok(code) => code,
        Err(e) => {
            print_error(color, &e);
            e.exit_code()
        }
    }
}

fn run_inner(cli: &Cli, color: &mut ColorChoice) -> Result<i32, RunError> {
    // 1. Configuration, then flags on top
    let config = Config::discover(cli.config.as_deref())?;
    let settings = resolve_settings(cli, &config);
    *color = settings.color;

    // 2. Program
    let program = match (&cli.program.file, &cli.program.source) {
        (Some(path), _) => fs::read_to_string(path).map_err(|source| RunError::Read {
            path: path.display().to_string(),
            source,
        })?,
        (None, Some(text)) => text.clone(),
        (None, None) => String::new(),
    };
    let options = EngineOptions {
        warn: cli.warn,
        formats: cli.formats().unwrap_or_else(|| config.document.formats.clone()),
        ..EngineOptions::default()
    };
    let engine = Spork::with_options(&program, options)?;
    log::debug!("loaded {} rule(s)", engine.rules().len());

    // 3. Inputs
    let inputs = discover_inputs(&cli.paths, &config)?;
    if inputs.is_empty() {
        log::warn!("No documents found to process.");
        return Ok(EXIT_SUCCESS);
    }

    // 4. Runs, in parallel but collected in input order
    let outcomes: Vec<Result<Report, RunError>> = inputs
        .par_iter()
        .map(|input| process_input(&engine, input, cli.select.as_deref(), &settings.parser))
        .collect();

    let mut reports = Vec::with_capacity(outcomes.len());
    let mut exit_code = EXIT_SUCCESS;
    for (input, outcome) in inputs.iter().zip(outcomes) {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                print_error(settings.color, &format_args!("{}: {}", input, e));
                if exit_code == EXIT_SUCCESS {
                    exit_code = e.exit_code();
                }
            }
        }
    }

    // 5. Output
    if cli.print {
        let output = match settings.format {
            OutputFormat::Json => JsonFormatter::new().format(&reports)?,
            OutputFormat::Jsonl => JsonlFormatter::new().format(&reports)?,
        };
        io::stdout()
            .lock()
            .write_all(output.as_bytes())
            .map_err(RunError::Write)?;
    }

    Ok(exit_code)
}

fn resolve_settings(cli: &Cli, config: &Config) -> Settings {
    let format = cli.format.unwrap_or(match config.output.format {
        config::OutputFormat::Json => OutputFormat::Json,
        config::OutputFormat::Jsonl => OutputFormat::Jsonl,
    });
    let color = cli.color.unwrap_or(match config.output.color {
        config::ColorOption::Auto => ColorChoice::Auto,
        config::ColorOption::Always => ColorChoice::Always,
        config::ColorOption::Never => ColorChoice::Never,
    });
    Settings {
        parser: config.parser.merge(cli.parser.options()),
        format,
        color,
    }
}

fn read_input(input: &Input) -> Result<Vec<u8>, RunError> {
    let result = match input {
        Input::Stdin => {
            let mut bytes = Vec::new();
            io::stdin().lock().read_to_end(&mut bytes).map(|_| bytes)
        }
        Input::File(path) => fs::read(path),
    };
    result.map_err(|source| RunError::Read {
        path: input.to_string(),
        source,
    })
}

/// Parse one input and run the program over it
fn process_input(
    engine: &Spork,
    input: &Input,
    select: Option<&str>,
    options: &ParserOptions,
) -> Result<Report, RunError> {
    let bytes = read_input(input)?;
    let root = document::parse_any(&bytes, engine.formats(), options).map_err(SporkError::Document)?;
    log::debug!("{}: parsed as {}", input, root.document().format());

    let results = match select {
        Some(css) => engine
            .select(css, Some(&root))?
            .into_iter()
            .map(|(_, namespace)| namespace)
            .collect(),
        None => vec![engine.run(Some(&root))?],
    };
    Ok(Report::new(input.to_string(), results))
}
