//! Storage Errors
//!
//! One taxonomy shared by every backend. Contract-level failures the caller
//! can recover from (missing record, duplicate add, malformed input) map to
//! 4xx-style responses in consumers; exceptional conditions (polling budget
//! exhausted, I/O or connection failure) map to 5xx-style responses.

use thiserror::Error;

use crate::uuid2::Uuid2Error;

/// Errors from storage operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No record with the given id.
    #[error("record not found: {id}")]
    NotFound {
        /// Identifier that was not found.
        id: String,
    },

    /// `add` on an id that is already present.
    #[error("record already exists: {id}")]
    AlreadyExists {
        /// Identifier that already exists.
        id: String,
    },

    /// The backing file never became visible within the polling budget.
    #[error("store unavailable: `{path}` missing after {attempts} polling attempts")]
    Unavailable {
        /// Path that was polled for.
        path: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// An identifier string or persisted JSON document failed to parse.
    #[error("malformed data: {message}")]
    Malformed {
        /// Parse failure detail.
        message: String,
    },

    /// Concurrent initialization collided (e.g. a search-index creation
    /// race). Callers usually downgrade this to a warning.
    #[error("conflict: {message}")]
    Conflict {
        /// Conflict detail.
        message: String,
    },

    /// Filesystem I/O or serialization failure.
    #[error("io error: {message}")]
    Io {
        /// I/O failure detail.
        message: String,
    },

    /// Remote client or connection failure.
    #[error("connection error: {message}")]
    Connection {
        /// Connection failure detail.
        message: String,
    },
}

impl StoreError {
    /// Create a not-found error.
    #[must_use]
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Create an already-exists error.
    #[must_use]
    pub fn already_exists(id: impl ToString) -> Self {
        Self::AlreadyExists { id: id.to_string() }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(path: impl Into<String>, attempts: u32) -> Self {
        Self::Unavailable {
            path: path.into(),
            attempts,
        }
    }

    /// Create a malformed-data error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Whether the caller has a reasonable recovery path (4xx-style).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::AlreadyExists { .. } | Self::Malformed { .. }
        )
    }

    /// Whether this is a not-found failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<Uuid2Error> for StoreError {
    fn from(err: Uuid2Error) -> Self {
        match err {
            Uuid2Error::Malformed { message } => Self::Malformed { message },
        }
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = StoreError::not_found("UUID2:Book@00000000-0000-0000-0000-000000000001");
        assert!(matches!(err, StoreError::NotFound { ref id } if id.contains("Book")));

        let err = StoreError::unavailable("books.json", 50);
        assert!(
            matches!(err, StoreError::Unavailable { ref path, attempts } if path == "books.json" && attempts == 50)
        );
    }

    #[test]
    fn test_recoverable_split() {
        assert!(StoreError::not_found("id").is_recoverable());
        assert!(StoreError::already_exists("id").is_recoverable());
        assert!(StoreError::malformed("bad json").is_recoverable());

        assert!(!StoreError::unavailable("f", 50).is_recoverable());
        assert!(!StoreError::io("disk full").is_recoverable());
        assert!(!StoreError::connection("refused").is_recoverable());
    }

    #[test]
    fn test_from_uuid2_error() {
        let err: StoreError = Uuid2Error::malformed("no `@`").into();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
