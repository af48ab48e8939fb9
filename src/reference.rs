//! External reference resolution.
//!
//! Items may point at source files or other artefacts in the project.
//! The legacy `ref` keyword is matched first against filenames, then
//! against file contents; structured references name a path directly.

use std::{
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;

/// File extensions never searched for keywords.
pub const DEFAULT_SKIP_EXTENSIONS: [&str; 3] = ["yml", "csv", "tsv"];

/// Where a reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// The matched file, relative to the search root.
    pub path: PathBuf,
    /// The matching line (1-based) for keyword matches.
    pub line: Option<usize>,
}

/// Resolves a legacy `ref` keyword under `root`.
///
/// A file whose name equals the keyword wins; otherwise the first file
/// containing the keyword as a whole word does. Hidden directories and
/// unreadable (binary) files are skipped, as are files with an
/// extension in `skip_extensions`.
///
/// # Errors
///
/// Returns [`Error::RefNotFound`] when nothing matches and
/// [`Error::Pattern`] for a keyword that cannot form a search pattern.
pub fn find_ref(keyword: &str, root: &Path, skip_extensions: &[String]) -> Result<Location, Error> {
    let files = project_files(root)?;

    for path in &files {
        if path.file_name().and_then(|n| n.to_str()) == Some(keyword) {
            return Ok(Location {
                path: relative_to(path, root),
                line: None,
            });
        }
    }

    let pattern = word_pattern(keyword)?;
    for path in &files {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if skip_extensions.iter().any(|skip| skip == extension) {
            continue;
        }
        let Ok(contents) = fs::read_to_string(path) else {
            continue;
        };
        for (index, line) in contents.lines().enumerate() {
            if pattern.is_match(line) {
                return Ok(Location {
                    path: relative_to(path, root),
                    line: Some(index + 1),
                });
            }
        }
    }

    Err(Error::RefNotFound(keyword.to_string()))
}

/// Resolves a structured file reference under `root`.
///
/// # Errors
///
/// Returns [`Error::FileNotFound`] when `path` does not name a file and
/// [`Error::KeywordNotFound`] when the keyword is absent from it.
pub fn find_file(path: &str, root: &Path, keyword: Option<&str>) -> Result<Location, Error> {
    let full = root.join(path);
    if !full.is_file() {
        return Err(Error::FileNotFound(path.to_string()));
    }
    let Some(keyword) = keyword else {
        return Ok(Location {
            path: PathBuf::from(path),
            line: None,
        });
    };

    let pattern = word_pattern(keyword)?;
    let contents = fs::read_to_string(&full).map_err(|source| Error::Read {
        path: path.to_string(),
        source,
    })?;
    for (index, line) in contents.lines().enumerate() {
        if pattern.is_match(line) {
            return Ok(Location {
                path: PathBuf::from(path),
                line: Some(index + 1),
            });
        }
    }
    Err(Error::KeywordNotFound {
        path: path.to_string(),
        keyword: keyword.to_string(),
    })
}

/// All regular files under `root`, hidden directories excluded, in a
/// stable order.
fn project_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });
    for entry in walker {
        let entry = entry.map_err(|source| Error::Walk {
            path: root.display().to_string(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn word_pattern(keyword: &str) -> Result<Regex, Error> {
    Regex::new(&format!(r"\b{}\b", regex::escape(keyword)))
        .map_err(|_| Error::Pattern(keyword.to_string()))
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Errors from reference resolution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No file matched the keyword by name or content.
    #[error("external reference not found: {0}")]
    RefNotFound(String),

    /// The referenced file does not exist.
    #[error("referenced file not found: {0}")]
    FileNotFound(String),

    /// The referenced file exists but lacks the keyword.
    #[error("keyword '{keyword}' not found in {path}")]
    KeywordNotFound {
        /// The referenced file.
        path: String,
        /// The missing keyword.
        keyword: String,
    },

    /// The keyword cannot be compiled into a search pattern.
    #[error("unusable reference keyword: {0}")]
    Pattern(String),

    /// The referenced file could not be read.
    #[error("cannot read {path}")]
    Read {
        /// The referenced file.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("cannot scan {path}")]
    Walk {
        /// The search root.
        path: String,
        /// The underlying error.
        source: walkdir::Error,
    },
}
