//! Discovery of input documents under directories
//!
//! Walks a directory with the ignore crate (so `.gitignore` is respected)
//! and keeps files matching the include globs and none of the exclude globs.

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during document discovery
#[derive(Debug, Error)]
pub enum FileWalkerError {
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),
}

/// Reason why a path was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Matched no include pattern, or an exclude pattern
    ExcludedByPattern,
    /// Not a regular file
    NotAFile,
}

/// A discovered document, or a path that was passed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkResult {
    File(PathBuf),
    Skipped { path: PathBuf, reason: SkipReason },
}

/// Compile glob patterns into one set
///
/// # Errors
///
/// `InvalidGlob` naming the first pattern that does not compile.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, FileWalkerError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| FileWalkerError::InvalidGlob {
            pattern: pattern.clone(),
            source: e,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| FileWalkerError::InvalidGlob {
        pattern: "<globset>".to_string(),
        source: e,
    })
}

/// Iterator over the documents below a directory
pub struct FileWalker {
    walker: ignore::Walk,
    include_set: Option<GlobSet>,
    exclude_set: GlobSet,
}

impl FileWalker {
    /// Creates a walker over `root`
    ///
    /// An empty `include` keeps every file. `**/.git/**` is always excluded.
    pub fn new(root: &Path, include: &[String], exclude: &[String]) -> Result<Self, FileWalkerError> {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let include_set = if include.is_empty() {
            None
        } else {
            Some(build_globset(include)?)
        };

        let mut exclude_patterns = Vec::from(exclude);
        exclude_patterns.push("**/.git/**".to_string());
        let exclude_set = build_globset(&exclude_patterns)?;

        Ok(Self {
            walker,
            include_set,
            exclude_set,
        })
    }

    /// Matching documents, in path order
    pub fn walk(self) -> impl Iterator<Item = Result<PathBuf, FileWalkerError>> {
        self.walk_with_skip_info().filter_map(|result| match result {
            Ok(WalkResult::File(path)) => Some(Ok(path)),
            Ok(WalkResult::Skipped { path, reason }) => {
                log::debug!("skipped {} ({:?})", path.display(), reason);
                None
            }
            Err(e) => Some(Err(e)),
        })
    }

    /// Every visited path, with the reason for skipped ones
    pub fn walk_with_skip_info(self) -> impl Iterator<Item = Result<WalkResult, FileWalkerError>> {
        let include_set = self.include_set;
        let exclude_set = self.exclude_set;

        self.walker.map(move |result| {
            let entry = result?;
            let path = entry.path().to_path_buf();
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                return Ok(WalkResult::Skipped {
                    path,
                    reason: SkipReason::NotAFile,
                });
            }
            let included = include_set.as_ref().is_none_or(|set| set.is_match(&path));
            if !included || exclude_set.is_match(&path) {
                return Ok(WalkResult::Skipped {
                    path,
                    reason: SkipReason::ExcludedByPattern,
                });
            }
            Ok(WalkResult::File(path))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pages/old")).unwrap();
        fs::write(dir.path().join("a.xml"), "<a/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "text").unwrap();
        fs::write(dir.path().join("pages/index.html"), "<p>").unwrap();
        fs::write(dir.path().join("pages/old/legacy.html"), "<p>").unwrap();
        dir
    }

    fn names(dir: &TempDir, include: &[&str], exclude: &[&str]) -> Vec<String> {
        let walker = FileWalker::new(dir.path(), &patterns(include), &patterns(exclude)).unwrap();
        walker
            .walk()
            .map(|path| {
                path.unwrap()
                    .strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_include_patterns_filter_files() {
        let dir = tree();
        assert_eq!(
            names(&dir, &["**/*.xml", "**/*.html"], &[]),
            vec!["a.xml", "pages/index.html", "pages/old/legacy.html"]
        );
    }

    #[test]
    fn test_exclude_patterns_win() {
        let dir = tree();
        assert_eq!(
            names(&dir, &["**/*.html"], &["**/old/**"]),
            vec!["pages/index.html"]
        );
    }

    #[test]
    fn test_empty_include_keeps_everything() {
        let dir = tree();
        assert_eq!(names(&dir, &[], &[]).len(), 4);
    }

    #[test]
    fn test_directories_are_reported_as_skipped() {
        let dir = tree();
        let walker = FileWalker::new(dir.path(), &[], &[]).unwrap();
        let skipped = walker
            .walk_with_skip_info()
            .filter(|r| {
                matches!(r, Ok(WalkResult::Skipped { reason: SkipReason::NotAFile, .. }))
            })
            .count();
        assert_eq!(skipped, 3);
    }

    #[test]
    fn test_invalid_glob() {
        let err = build_globset(&patterns(&["a[b"])).unwrap_err();
        assert!(matches!(err, FileWalkerError::InvalidGlob { pattern, .. } if pattern == "a[b"));
    }
}
