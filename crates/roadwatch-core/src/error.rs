//! Error types for roadwatch.

use thiserror::Error;

/// Result type alias using roadwatch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for roadwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Task is not registered in the task registry
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// The detection worker rejected or garbled a job submission
    #[error("Submission error: {0}")]
    Submission(String),

    /// The captioning request was malformed or the client is misconfigured
    #[error("Model error: {0}")]
    Model(String),

    /// Network or 5xx failure talking to the worker; safe to retry
    #[error("Transport error: {0}")]
    Transport(String),

    /// The worker does not know the job (restarted or expired)
    #[error("Job not found on worker: {0}")]
    NotFoundOnWorker(String),

    /// Incident id was taken between allocation and insert
    #[error("Duplicate incident id: {0}")]
    DuplicateId(i64),

    /// Incident could not be saved
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is expected to clear up on its own (polling keeps going).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Request(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_submission() {
        let err = Error::Submission("worker returned 500".to_string());
        assert_eq!(err.to_string(), "Submission error: worker returned 500");
    }

    #[test]
    fn test_error_display_duplicate_id() {
        let err = Error::DuplicateId(7);
        assert_eq!(err.to_string(), "Duplicate incident id: 7");
    }

    #[test]
    fn test_error_display_not_found_on_worker() {
        let err = Error::NotFoundOnWorker("job-1".to_string());
        assert_eq!(err.to_string(), "Job not found on worker: job-1");
    }

    #[test]
    fn test_error_display_model() {
        let err = Error::Model("400 Bad Request".to_string());
        assert_eq!(err.to_string(), "Model error: 400 Bad Request");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Transport("connection refused".into()).is_transient());
        assert!(Error::Request("timed out".into()).is_transient());
        assert!(!Error::NotFoundOnWorker("x".into()).is_transient());
        assert!(!Error::Submission("x".into()).is_transient());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(ref msg) if !msg.is_empty()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
