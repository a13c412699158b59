//! Error taxonomy for regression runs.
//!
//! Per-case recoverable conditions (connection failures, missing reference
//! timings) are converted into result classifications by the runner and never
//! surface here. The variants below are the conditions that abort a case or,
//! for strict-mode pretty-print failures, the whole run.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SvcdiffError>;

#[derive(Debug, Error)]
pub enum SvcdiffError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to stat {path}: {source}")]
    FileStat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed case line {path}:{line_no}: {reason}")]
    MalformedCaseLine {
        path: PathBuf,
        line_no: usize,
        reason: String,
    },

    #[error("Invalid filter pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex_lite::Error,
    },

    /// Canonicalized text failed to parse as JSON under strict mode. The
    /// offending content has already been saved to `bad_path` for inspection.
    #[error("Canonical rendering for {path} is not valid JSON (saved to {bad_path}): {source}")]
    PrettyPrint {
        path: PathBuf,
        bad_path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize canonical JSON: {source}")]
    JsonSerialize { source: serde_json::Error },

    #[error("Failed to run {tool}: {source}")]
    DiffTool {
        tool: &'static str,
        source: std::io::Error,
    },
}

impl SvcdiffError {
    pub(crate) fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        SvcdiffError::FileRead {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        SvcdiffError::FileWrite {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn stat(path: &std::path::Path, source: std::io::Error) -> Self {
        SvcdiffError::FileStat {
            path: path.to_path_buf(),
            source,
        }
    }
}
