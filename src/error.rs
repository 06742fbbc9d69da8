//! Error taxonomy for remote data acquisition, plus exit codes for the CLI.

use std::path::PathBuf;

use serde::Serialize;

/// Errors surfaced by name resolution, downloading and manifest handling.
///
/// Callers decide how to react: a missing tile is usually treated as
/// absent, while a missing dataset requested by name is reported.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No catalog, tile, cache or literal-path match, or the server
    /// answered 404.
    #[error("not found: {name}{}", suggestion_suffix(.suggestion))]
    NotFound {
        /// The name or URL that could not be found.
        name: String,
        /// Closest known dataset name, if any.
        suggestion: Option<String>,
    },

    /// The file exists but cannot be read.
    #[error("permission denied: {0}")]
    BadPermission(PathBuf),

    /// The server could not be reached; further network use is disabled
    /// for the rest of the session.
    #[error("remote server unavailable: {0}")]
    NetworkUnavailable(String),

    /// The pre-flight size check exceeded the configured limit.
    #[error("{url} is {size} which exceeds the download limit of {limit}")]
    TooLarge {
        url: String,
        size: bytesize::ByteSize,
        limit: bytesize::ByteSize,
    },

    /// A manifest or downloaded file failed an integrity check.
    #[error("corrupt file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Waiting for another process holding the download lock timed out.
    #[error("timed out waiting for lock on {0}")]
    LockTimeout(PathBuf),

    /// The server answered with an error status other than 404.
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    /// A region was requested from a dataset that is not tiled.
    #[error("{0} is not a tiled dataset")]
    NotTiled(String),

    /// The transfer was cancelled by the user.
    #[error("download of {0} was interrupted")]
    Interrupted(PathBuf),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean @{name}?)"),
        None => String::new(),
    }
}

impl RemoteError {
    /// Shorthand for a `NotFound` without a suggestion.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            suggestion: None,
        }
    }

    /// Whether the caller may treat this failure as "the resource is absent".
    #[must_use]
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NetworkUnavailable(_))
    }
}

/// Result alias for remote data operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Exit codes for the geofetch binary.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: A requested dataset or file was not found
/// - 3: The remote server could not be reached
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: all requested files are available locally.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Not found: a requested name did not resolve.
    NotFound = 2,
    /// Network unavailable: the server could not be reached.
    NetworkUnavailable = 3,
    /// Interrupted: a download was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "GF000",
            Self::GeneralError => "GF001",
            Self::NotFound => "GF002",
            Self::NetworkUnavailable => "GF003",
            Self::Interrupted => "GF130",
        }
    }

    /// Pick the exit code matching an application error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<RemoteError>() {
            Some(
                RemoteError::NotFound { .. } | RemoteError::BadPermission(_) | RemoteError::NotTiled(_),
            ) => Self::NotFound,
            Some(RemoteError::NetworkUnavailable(_)) => Self::NetworkUnavailable,
            Some(RemoteError::Interrupted(_)) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "GF001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
