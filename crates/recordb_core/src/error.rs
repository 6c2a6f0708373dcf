//! Error types for recordb core.

use recordb_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in recordb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A record could not be converted to or from a typed value.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// `with` named a relationship the schema does not declare.
    #[error("no relationship setup for store {store} with the key: {name}")]
    RelationshipNotFound {
        /// Store of the record.
        store: String,
        /// The requested relationship name.
        name: String,
    },

    /// The record has no key to address storage with.
    #[error("record in store {store} has no key; make sure the key is hydrated")]
    MissingKey {
        /// Store of the record.
        store: String,
    },

    /// No plugin is registered under the configured name.
    #[error("connection plugin not found: {name}")]
    PluginNotFound {
        /// The requested plugin name.
        name: String,
    },

    /// No connection is cached under the name.
    #[error("connection not found: {name}")]
    ConnectionNotFound {
        /// The requested connection name.
        name: String,
    },

    /// The registry has no default connection yet.
    #[error("no default connection has been initialized")]
    NoDefaultConnection,

    /// A value passed as record data is not a JSON object.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a relationship not found error.
    pub fn relationship_not_found(store: impl Into<String>, name: impl Into<String>) -> Self {
        Self::RelationshipNotFound {
            store: store.into(),
            name: name.into(),
        }
    }

    /// Creates a missing key error.
    pub fn missing_key(store: impl Into<String>) -> Self {
        Self::MissingKey {
            store: store.into(),
        }
    }

    /// Creates a plugin not found error.
    pub fn plugin_not_found(name: impl Into<String>) -> Self {
        Self::PluginNotFound { name: name.into() }
    }

    /// Creates a connection not found error.
    pub fn connection_not_found(name: impl Into<String>) -> Self {
        Self::ConnectionNotFound { name: name.into() }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Returns true for errors raised by the storage layer.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
