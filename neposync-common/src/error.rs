//! Common error types for neposync

use thiserror::Error;

/// Common result type for neposync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type at the store adapter boundary
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Application-level errors (configuration, I/O outside any store)
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures reported by a `StoreAdapter`.
///
/// Only `BackendUnavailable` is fatal for a run; every other variant is
/// reported against a single file and traversal moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Identity is unknown to this store
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection or session to the backend is not usable
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The store refuses this specific write
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// The entry exists but its metadata cannot be decoded or encoded
    #[error("unreadable metadata: {0}")]
    Unreadable(String),
}

impl StoreError {
    /// True when the whole run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::BackendUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::BackendUnavailable(err.to_string()),
            other => StoreError::Unreadable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_backend_unavailable_is_fatal() {
        assert!(StoreError::BackendUnavailable("db".into()).is_fatal());
        assert!(!StoreError::NotFound("a".into()).is_fatal());
        assert!(!StoreError::WriteRejected("a".into()).is_fatal());
        assert!(!StoreError::Unreadable("a".into()).is_fatal());
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn sqlx_errors_map_onto_taxonomy() {
        assert!(StoreError::from(sqlx::Error::RowNotFound).is_not_found());
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_fatal());
        assert!(matches!(
            StoreError::from(sqlx::Error::ColumnNotFound("rating".into())),
            StoreError::Unreadable(_)
        ));
    }
}
