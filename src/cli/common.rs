//! Helpers shared by the CLI: exit codes, input discovery and diagnostics

use crate::cli::args::ColorChoice;
use crate::config::Config;
use crate::engine::file_walker::{FileWalker, FileWalkerError};
use std::fmt;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_EVAL_ERROR: i32 = 1;
pub const EXIT_ERROR: i32 = 2;
pub const EXIT_SCRIPT_ERROR: i32 = 3;

/// A document to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Stdin => write!(f, "-"),
            Input::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolve command-line paths into inputs
///
/// No paths, or `-`, mean standard input. Directories are walked with the
/// include/exclude patterns from the configuration; files named directly are
/// always kept.
///
/// # Errors
///
/// Returns `FileWalkerError` if a directory cannot be walked.
pub(crate) fn discover_inputs(paths: &[String], config: &Config) -> Result<Vec<Input>, FileWalkerError> {
    if paths.is_empty() {
        return Ok(vec![Input::Stdin]);
    }

    let mut inputs = Vec::new();
    for path_str in paths {
        if path_str == "-" {
            inputs.push(Input::Stdin);
            continue;
        }
        let path = Path::new(path_str);
        if !path.is_dir() {
            inputs.push(Input::File(path.to_path_buf()));
            continue;
        }
        let walker = FileWalker::new(path, &config.document.include, &config.document.exclude)?;
        for result in walker.walk() {
            inputs.push(Input::File(result?));
        }
    }
    Ok(inputs)
}

fn color_choice(choice: ColorChoice) -> termcolor::ColorChoice {
    match choice {
        ColorChoice::Always => termcolor::ColorChoice::Always,
        ColorChoice::Never => termcolor::ColorChoice::Never,
        ColorChoice::Auto if std::io::stderr().is_terminal() => termcolor::ColorChoice::Auto,
        ColorChoice::Auto => termcolor::ColorChoice::Never,
    }
}

/// Print `message` to stderr behind a red `error:` label
pub(crate) fn print_error(choice: ColorChoice, message: &dyn fmt::Display) {
    let mut stderr = StandardStream::stderr(color_choice(choice));
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stderr, "error");
    let _ = stderr.reset();
    let _ = writeln!(stderr, ": {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_no_paths_means_stdin() {
        let inputs = discover_inputs(&[], &Config::default()).unwrap();
        assert_eq!(inputs, vec![Input::Stdin]);
    }

    #[test]
    fn test_dash_and_explicit_files() {
        let inputs = discover_inputs(
            &["-".to_string(), "notes.txt".to_string()],
            &Config::default(),
        )
        .unwrap();
        assert_eq!(inputs, vec![Input::Stdin, Input::File(PathBuf::from("notes.txt"))]);
    }

    #[test]
    fn test_directories_use_config_patterns() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.xml"), "<a/>").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let inputs = discover_inputs(&[root], &Config::default()).unwrap();
        assert_eq!(inputs, vec![Input::File(dir.path().join("a.xml"))]);
    }

    #[test]
    fn test_input_display() {
        assert_eq!(Input::Stdin.to_string(), "-");
        assert_eq!(Input::File(PathBuf::from("x/y.xml")).to_string(), "x/y.xml");
    }
}
