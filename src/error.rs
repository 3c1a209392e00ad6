use std::{fmt, path::PathBuf};

use strum::{Display, EnumIter};
use thiserror::Error;

macro_rules! resolve_error {
    // Single string version
    ($kind:ident, $location:expr, $msg:expr) => {
        crate::Error::$kind {
            message: $msg.to_string(),
            location: $location,
        }
    };

    // Format string with arguments version
    ($kind:ident, $location:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::$kind {
            message: format!($fmt, $($arg)*),
            location: $location,
        }
    };
}

/// Position of a declaration inside a module description file.
///
/// Every resolution failure points back at the declaration that caused it. The line is
/// optional because some checks (e.g. a missing `MODULE_TYPE`) have no single record
/// to blame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// The module description file (`.inf`) being resolved
    pub file: PathBuf,
    /// The source line of the offending record, if one exists
    pub line: Option<u32>,
}

impl Location {
    /// Creates a location pointing at a specific line of `file`
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Location {
            file: file.into(),
            line: Some(line),
        }
    }

    /// Creates a location that refers to the file as a whole
    #[must_use]
    pub fn file(file: impl Into<PathBuf>) -> Self {
        Location {
            file: file.into(),
            line: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}({})", self.file.display(), line),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

/// The category of a resolution failure.
///
/// Mirrors the variants of [`Error`] without their payload, so callers can match on
/// the failure class alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ErrorKind {
    /// A mandatory declaration is absent
    MissingRequiredField,
    /// A declared value is outside its closed set
    UnsupportedValue,
    /// A symbolic name could not be found in any dependent package
    UnresolvedSymbol,
    /// A numeric literal is malformed or out of range
    MalformedLiteral,
    /// A declared file is missing or has the wrong extension
    FileValidation,
    /// A default-value expression was rejected
    ExpressionEvaluation,
    /// Two declarations contradict each other
    StructuralConflict,
    /// Filesystem I/O failure
    Io,
    /// Anything else
    Other,
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every resolution failure is fatal for the module being resolved: there is no partially
/// resolved facade. The only recoverable condition (a missing optional header file listed as
/// a source) is reported through `log::warn!` and never surfaces as an [`Error`].
///
/// # Error Categories
///
/// - [`Error::MissingRequiredField`] - e.g. no `BASE_NAME`, no `MODULE_TYPE`, no `[Depex]`
/// - [`Error::UnsupportedValue`] - module kind, datum type or flag outside its closed set
/// - [`Error::UnresolvedSymbol`] - protocol / PPI / GUID / PCD / module not found
/// - [`Error::MalformedLiteral`] - PCD token value or version literal is invalid
/// - [`Error::FileValidation`] - declared file is missing or has the wrong extension
/// - [`Error::ExpressionEvaluation`] - a PCD default value expression was rejected
/// - [`Error::StructuralConflict`] - contradicting declarations
///
/// # Examples
///
/// ```rust,no_run
/// use infscope::{Error, ErrorKind};
///
/// fn report(err: &Error) {
///     match err.kind() {
///         ErrorKind::UnresolvedSymbol => eprintln!("missing package dependency: {err}"),
///         _ => eprintln!("{err}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A mandatory declaration is absent.
    #[error("{location}: {message}")]
    MissingRequiredField {
        /// Description of the missing declaration
        message: String,
        /// Where the declaration was expected
        location: Location,
    },

    /// A value is not part of the closed set accepted for its field.
    #[error("{location}: {message}")]
    UnsupportedValue {
        /// Description of the unsupported value
        message: String,
        /// The offending declaration
        location: Location,
    },

    /// A symbolic name is not declared by any of the module's dependent packages.
    ///
    /// The message lists the packages that were searched.
    #[error("{location}: {message}")]
    UnresolvedSymbol {
        /// Description of the unresolved symbol and the searched packages
        message: String,
        /// The record that referenced the symbol
        location: Location,
    },

    /// A numeric literal is malformed or out of its allowed range.
    #[error("{location}: {message}")]
    MalformedLiteral {
        /// Description of the literal and the expected format
        message: String,
        /// The record that referenced the literal
        location: Location,
    },

    /// A declared file does not exist or has an unexpected extension.
    #[error("{location}: {message}")]
    FileValidation {
        /// Description of the file problem
        message: String,
        /// The record that declared the file
        location: Location,
    },

    /// A PCD default value expression was rejected by the evaluator.
    #[error("{location}: {message}")]
    ExpressionEvaluation {
        /// The evaluator's diagnostic
        message: String,
        /// The PCD record
        location: Location,
    },

    /// Two declarations contradict each other.
    #[error("{location}: {message}")]
    StructuralConflict {
        /// Description of the conflict
        message: String,
        /// The second of the conflicting declarations
        location: Location,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns the category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingRequiredField { .. } => ErrorKind::MissingRequiredField,
            Error::UnsupportedValue { .. } => ErrorKind::UnsupportedValue,
            Error::UnresolvedSymbol { .. } => ErrorKind::UnresolvedSymbol,
            Error::MalformedLiteral { .. } => ErrorKind::MalformedLiteral,
            Error::FileValidation { .. } => ErrorKind::FileValidation,
            Error::ExpressionEvaluation { .. } => ErrorKind::ExpressionEvaluation,
            Error::StructuralConflict { .. } => ErrorKind::StructuralConflict,
            Error::FileError(_) => ErrorKind::Io,
            Error::Error(_) => ErrorKind::Other,
        }
    }

    /// Returns the declaration location, if this error carries one
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::MissingRequiredField { location, .. }
            | Error::UnsupportedValue { location, .. }
            | Error::UnresolvedSymbol { location, .. }
            | Error::MalformedLiteral { location, .. }
            | Error::FileValidation { location, .. }
            | Error::ExpressionEvaluation { location, .. }
            | Error::StructuralConflict { location, .. } => Some(location),
            Error::FileError(_) | Error::Error(_) => None,
        }
    }
}
