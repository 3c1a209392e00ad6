//! Declared file references and their validation against the filesystem.
//!
//! Paths in module description files use either separator and are relative to the module
//! directory (sources, binaries, dependency expression files) or to the workspace root
//! (packages). Existence checks are plain synchronous `stat` calls.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Why a declared file was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The extension is not one of the accepted ones
    #[error("file type of {file} is not supported, expected {expected}")]
    Extension {
        /// The declared file
        file: String,
        /// Accepted extensions
        expected: String,
    },
    /// The file exists nowhere on the search path
    #[error("file {file} not found in: {}", join_dirs(.searched))]
    NotFound {
        /// The declared file
        file: String,
        /// Directories that were searched
        searched: Vec<PathBuf>,
    },
}

fn join_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A declared file that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    /// The path as declared, normalized to `/` separators
    pub declared: String,
    /// Where the file was found
    pub path: PathBuf,
}

impl FileRef {
    /// Lower-case extension including the dot, `""` if there is none
    #[must_use]
    pub fn extension(&self) -> String {
        extension_of(&self.declared)
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declared)
    }
}

/// Normalizes a declared path: `\` becomes `/`, `.` components are dropped, `..` components
/// cancel the preceding component when there is one.
///
/// # Examples
///
/// ```rust
/// use infscope::metadata::path::normalize_path;
///
/// assert_eq!(normalize_path(".\\Foo\\..\\Bar/x.c"), "Bar/x.c");
/// assert_eq!(normalize_path("../Common/x.h"), "../Common/x.h");
/// ```
#[must_use]
pub fn normalize_path(text: &str) -> String {
    let text = text.trim().replace('\\', "/");
    let absolute = text.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in text.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Lower-case extension of `path` including the dot, `""` if there is none
#[must_use]
pub fn extension_of(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(index) => name[index..].to_ascii_lowercase(),
    }
}

/// Validates a declared file and locates it on disk.
///
/// # Arguments
/// * `declared` - The macro-expanded path as written in the module description file
/// * `search` - Directories to try in order; an absolute `declared` path ignores them
/// * `extensions` - Accepted extensions (lower-case, with dot), `None` accepts any
///
/// # Errors
///
/// Returns [`PathError::Extension`] when the extension is not accepted and
/// [`PathError::NotFound`] when no search directory contains the file.
pub fn locate(
    declared: &str,
    search: &[&Path],
    extensions: Option<&[&str]>,
) -> Result<FileRef, PathError> {
    let declared = normalize_path(declared);

    if let Some(accepted) = extensions {
        let ext = extension_of(&declared);
        if !accepted.iter().any(|candidate| candidate.eq_ignore_ascii_case(&ext)) {
            return Err(PathError::Extension {
                file: declared,
                expected: accepted.join(" "),
            });
        }
    }

    let relative = Path::new(&declared);
    if relative.is_absolute() {
        if relative.is_file() {
            return Ok(FileRef {
                path: relative.to_path_buf(),
                declared,
            });
        }
        return Err(PathError::NotFound {
            file: declared,
            searched: Vec::new(),
        });
    }

    for dir in search {
        let candidate = dir.join(relative);
        if candidate.is_file() {
            return Ok(FileRef {
                declared,
                path: candidate,
            });
        }
    }

    Err(PathError::NotFound {
        file: declared,
        searched: search.iter().map(|dir| dir.to_path_buf()).collect(),
    })
}

/// Canonical form of an existing directory, `None` if it does not exist
#[must_use]
pub fn real_dir(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        std::fs::canonicalize(path).ok()
    } else {
        None
    }
}
