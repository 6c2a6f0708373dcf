//! Error types for storage operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store is not declared in the connection configuration.
    #[error("store not found: {store}")]
    StoreNotFound {
        /// Name of the requested store.
        store: String,
    },

    /// A unique index already maps the value to a different key.
    #[error("unique index {index} on store {store} already contains value {value:?}")]
    UniqueViolation {
        /// Store being written.
        store: String,
        /// Name of the unique index.
        index: String,
        /// The conflicting index value.
        value: String,
    },

    /// A persisted document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persisted schema version is newer than the requested one.
    #[error("version conflict: requested version {requested}, stored version {stored}")]
    VersionConflict {
        /// Version requested by the configuration.
        requested: u32,
        /// Version already recorded by the backend.
        stored: u32,
    },

    /// A persisted document is not shaped as expected.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A bounded wait on the underlying store ran out.
    #[error("{operation} timed out after {waited:?}")]
    Timeout {
        /// The operation that was waiting.
        operation: String,
        /// How long it waited.
        waited: Duration,
    },

    /// Backend-specific failure reported by a plugin.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a store not found error.
    pub fn store_not_found(store: impl Into<String>) -> Self {
        Self::StoreNotFound {
            store: store.into(),
        }
    }

    /// Creates a unique violation error.
    pub fn unique_violation(
        store: impl Into<String>,
        index: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::UniqueViolation {
            store: store.into(),
            index: index.into(),
            value: value.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            waited,
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        let err = StorageError::unique_violation("users", "email", "a@test.com");
        assert!(err.to_string().contains("email"));
        assert!(err.to_string().contains("users"));

        let err = StorageError::timeout("get_item", Duration::from_millis(250));
        assert_eq!(err.to_string(), "get_item timed out after 250ms");
    }
}
