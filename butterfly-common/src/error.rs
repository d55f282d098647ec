//! Error types for the butterfly-osm toolkit
//!
//! Shared by every crate in the workspace so that callers only ever match on
//! one error enum.

use thiserror::Error;

/// Main error type for butterfly-osm operations
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Background worker is not running
    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl Error {
    /// Build an `InvalidInput` error from anything printable
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

/// Convenience result type for butterfly-osm operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "fog.json");
        let err: Error = io.into();
        assert!(matches!(err, Error::IoError(_)));
        assert_eq!(err.to_string(), "I/O error: fog.json");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::invalid_input("cell_size must be positive").to_string(),
            "Invalid input: cell_size must be positive"
        );
        assert_eq!(
            Error::WorkerUnavailable("shut down".to_string()).to_string(),
            "Worker unavailable: shut down"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from(io);
        assert!(err.source().is_some());
        assert!(Error::invalid_input("x").source().is_none());
    }
}
