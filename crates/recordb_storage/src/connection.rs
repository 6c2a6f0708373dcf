//! Storage connection protocol.

use crate::config::DatabaseConfig;
use crate::error::StorageResult;
use crate::key::Key;
use crate::options::{CursorOptions, QueryResult, SearchOptions};
use crate::types::Resource;
use serde_json::Value;
use std::sync::Arc;

/// A bound handle to a configured storage backend.
///
/// Every backend must reproduce the same observable semantics:
///
/// # Invariants
///
/// - Keys are compared as normalized [`Key`] values
/// - A `set` is visible to every subsequent read on the same connection
/// - `set` and `delete` update all declared indexes of the store under the
///   same lock as the record itself; an index never points at a stale or
///   duplicate entry for a key
/// - Index iteration is ascending by the index's string value, primary
///   iteration ascending by [`Key`] order; [`crate::Direction::Desc`]
///   reverses either
/// - `offset` skips matches, not scanned rows
/// - Operations on undeclared stores fail with
///   [`crate::StorageError::StoreNotFound`]; queries on undeclared indexes
///   return the empty result for their operator
///
/// # Implementors
///
/// - [`crate::MemoryConnection`] - in-memory maps
/// - [`crate::KvConnection`] - flat key/value documents
pub trait Connection: Send + Sync {
    /// Returns the connection name.
    fn name(&self) -> &str;

    /// Returns the configuration the connection was opened with.
    fn config(&self) -> &DatabaseConfig;

    /// Reads the record stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, store: &str, key: &Key) -> StorageResult<Option<Resource>>;

    /// Inserts or replaces the record under `key`, updating indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unknown or a unique index would be
    /// violated. Nothing is written in that case.
    fn set(&self, store: &str, key: &Key, record: Resource) -> StorageResult<Resource>;

    /// Removes the record under `key` and its index entries.
    ///
    /// Returns `Ok(true)` if a record was removed.
    fn delete(&self, store: &str, key: &Key) -> StorageResult<bool>;

    /// Runs an indexed `where` lookup.
    ///
    /// The result is [`QueryResult::Single`] for
    /// [`crate::Operator::Equals`] and [`QueryResult::Many`] otherwise.
    fn query(
        &self,
        store: &str,
        index: &str,
        search: &Value,
        options: &SearchOptions,
    ) -> StorageResult<QueryResult>;

    /// Scans a store in primary-key order, or in `index` order when given.
    fn all(
        &self,
        store: &str,
        index: Option<&str>,
        options: &CursorOptions,
    ) -> StorageResult<Vec<Resource>>;
}

/// Creates connections for a backend.
///
/// `setup` provisions declared stores and indexes on first open and must be
/// a no-op for stores and indexes that already exist.
pub trait ConnectionPlugin: Send + Sync {
    /// Name under which the plugin is registered.
    fn name(&self) -> &str;

    /// Opens a connection for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if provisioning fails.
    fn setup(&self, config: &DatabaseConfig) -> StorageResult<Arc<dyn Connection>>;
}
