//! Error types for PaperTrail.
//!
//! Library crates use [`PaperTrailError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all PaperTrail operations.
#[derive(Debug, thiserror::Error)]
pub enum PaperTrailError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure, timeout, non-success HTTP status, or an API-reported error.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// An identifier resolved to zero results.
    #[error("not found: {0}")]
    NotFound(String),

    /// A document was fetched but its structure could not be recognized.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Malformed on-disk structure while loading or saving the profile store.
    #[error("persistence error: {message}")]
    Persistence { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (unrecognized reference, blocked URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PaperTrailError>;

impl PaperTrailError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a persistence error from any displayable message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for an identifier.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a retrieval failure (network, status, API error).
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::Retrieval(_))
    }

    /// Whether this is a not-found failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PaperTrailError::config("missing store path");
        assert_eq!(err.to_string(), "config error: missing store path");

        let err = PaperTrailError::not_found("arXiv id 9999.99999");
        assert_eq!(err.to_string(), "not found: arXiv id 9999.99999");

        let err = PaperTrailError::persistence("top-level value is not an object");
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn error_classification() {
        assert!(PaperTrailError::Retrieval("HTTP 503".into()).is_retrieval());
        assert!(!PaperTrailError::Retrieval("HTTP 503".into()).is_not_found());
        assert!(PaperTrailError::not_found("x").is_not_found());
        assert!(!PaperTrailError::parse("bad pdf").is_retrieval());
    }
}
