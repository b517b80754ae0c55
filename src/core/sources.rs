// Source reference parsing and filesystem resolution.
// Resolved paths are canonical and sorted so resolving twice yields the same set.
// Literal references must name an existing file; `*`/`?` globs may match nothing.
// A reference whose only metacharacter is `[` names a file: an existing file of that
// exact name wins, and a bracket pattern matching nothing is a missing source.
use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::core::error::{Error, ErrorKind, map_io_error_kind};

const GLOB_META: [char; 3] = ['*', '?', '['];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SourceRef {
    Literal(PathBuf),
    Glob(String),
}

impl SourceRef {
    pub fn parse(text: &str) -> Self {
        if text.contains(GLOB_META) {
            SourceRef::Glob(text.to_string())
        } else {
            SourceRef::Literal(PathBuf::from(text))
        }
    }

    pub fn is_glob(&self) -> bool {
        matches!(self, SourceRef::Glob(_))
    }

    pub fn describe(&self) -> String {
        match self {
            SourceRef::Literal(path) => path.to_string_lossy().to_string(),
            SourceRef::Glob(pattern) => pattern.clone(),
        }
    }

    pub fn resolve(&self, base: &Path) -> Result<Vec<PathBuf>, Error> {
        match self {
            SourceRef::Literal(path) => resolve_literal(&base.join(path)).map(|path| vec![path]),
            SourceRef::Glob(pattern) => {
                let literal = base.join(pattern);
                if literal.is_file() {
                    return canonical(&literal).map(|path| vec![path]);
                }
                let paths = resolve_glob(pattern, base)?;
                if paths.is_empty() && !pattern.contains(['*', '?']) {
                    return Err(Error::new(ErrorKind::SourceNotFound)
                        .with_message("source file not found")
                        .with_path(literal)
                        .with_hint("Escape literal brackets as [[] to match them in a pattern."));
                }
                Ok(paths)
            }
        }
    }
}

fn resolve_literal(path: &Path) -> Result<PathBuf, Error> {
    let metadata = fs::metadata(path).map_err(|err| {
        let kind = match map_io_error_kind(&err) {
            ErrorKind::NotFound => ErrorKind::SourceNotFound,
            other => other,
        };
        Error::new(kind)
            .with_message("source file not found")
            .with_path(path)
            .with_source(err)
    })?;
    if !metadata.is_file() {
        return Err(Error::new(ErrorKind::SourceNotFound)
            .with_message("source path is not a regular file")
            .with_path(path));
    }
    canonical(path)
}

fn resolve_glob(pattern: &str, base: &Path) -> Result<Vec<PathBuf>, Error> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let base = base.to_str().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("source root is not valid UTF-8")
                .with_path(base)
        })?;
        format!("{}/{pattern}", Pattern::escape(base.trim_end_matches('/')))
    };

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let entries = glob::glob_with(&full_pattern, options).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid source glob `{pattern}`: {}", err.msg))
            .with_hint("Escape literal brackets as [[] and check the pattern syntax.")
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| {
            let path = err.path().to_path_buf();
            let io_err = err.into_error();
            Error::new(map_io_error_kind(&io_err))
                .with_message("failed to read directory while expanding source glob")
                .with_path(path)
                .with_source(io_err)
        })?;
        if path.is_file() {
            paths.push(canonical(&path)?);
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn canonical(path: &Path) -> Result<PathBuf, Error> {
    fs::canonicalize(path).map_err(|err| {
        Error::new(map_io_error_kind(&err))
            .with_message("failed to resolve source path")
            .with_path(path)
            .with_source(err)
    })
}
