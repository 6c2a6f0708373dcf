//! Flat key/value connection backend.
//!
//! Records, key lists and index tables are stored as JSON documents in a
//! [`KeyValueStore`], one item per document:
//!
//! | item | contents |
//! |---|---|
//! | `recordb:{db}/{store}:{key}` | the record |
//! | `recordb:__{db}/{store}` | sorted array of the store's keys |
//! | `recordb:__{db}/{store}#{index}` | index value to keys |
//! | `recordb:__{db}#version` | provisioned schema version |

use crate::config::{DatabaseConfig, IndexConfig, StoreConfig};
use crate::connection::{Connection, ConnectionPlugin};
use crate::error::{StorageError, StorageResult};
use crate::index::{check_unique, IndexTable};
use crate::key::Key;
use crate::options::{CursorOptions, QueryResult, SearchOptions};
use crate::types::{field_text, value_text, Resource};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

const PREFIX: &str = "recordb:";

/// A flat string-to-string item store.
///
/// Items are opaque to the store; [`KvConnection`] owns the document layout.
/// Implementations that wait on an external request must bound the wait
/// and report [`StorageError::Timeout`] when it runs out.
pub trait KeyValueStore: Send + Sync {
    /// Reads an item.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes an item, replacing any previous value.
    fn set_item(&self, key: &str, value: String) -> StorageResult<()>;

    /// Removes an item. Returns `Ok(true)` if it existed.
    fn remove_item(&self, key: &str) -> StorageResult<bool>;
}

/// A [`KeyValueStore`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Returns true if `key` holds an item.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items.read().contains_key(key)
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) -> StorageResult<()> {
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<bool> {
        Ok(self.items.write().remove(key).is_some())
    }
}

// Serializes multi-item writes against reads on one item store.
type ItemLock = Arc<RwLock<()>>;

// Item name and its raw value before a write, `None` if it was absent.
type Undo = Vec<(String, Option<String>)>;

/// A connection storing JSON documents in a [`KeyValueStore`].
///
/// Reopening a connection over the same item store keeps existing records
/// and index tables. Indexes added in a later version are built from the
/// records already present.
///
/// A write stores the record first, then the key list, then the index
/// tables. If any of those writes fails, the items already written are
/// restored, so an index never names a key without a record.
pub struct KvConnection {
    config: DatabaseConfig,
    items: Arc<dyn KeyValueStore>,
    lock: ItemLock,
}

impl KvConnection {
    /// Opens a connection and provisions declared stores and indexes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::VersionConflict`] if the item store was
    /// provisioned with a newer version than `config` requests.
    ///
    /// Connections opened this way do not coordinate with other
    /// connections over `items`; open them through one [`KvPlugin`] to
    /// share its lock.
    pub fn open(config: DatabaseConfig, items: Arc<dyn KeyValueStore>) -> StorageResult<Self> {
        Self::open_locked(config, items, ItemLock::default())
    }

    fn open_locked(
        config: DatabaseConfig,
        items: Arc<dyn KeyValueStore>,
        lock: ItemLock,
    ) -> StorageResult<Self> {
        let connection = Self {
            config,
            items,
            lock,
        };
        connection.provision()?;
        Ok(connection)
    }

    fn provision(&self) -> StorageResult<()> {
        let _guard = self.lock.write();
        let requested = self.config.version_or_default();
        let version_item = format!("{PREFIX}__{}#version", self.config.name);
        let stored = self.read_json::<u32>(&version_item)?;

        if let Some(stored) = stored {
            if requested < stored {
                return Err(StorageError::VersionConflict { requested, stored });
            }
        }

        for store in &self.config.stores {
            let keys_item = self.keys_item(&store.name);
            if self.items.get_item(&keys_item)?.is_none() {
                tracing::debug!(db = %self.config.name, store = %store.name, "creating store");
                self.write_json(&keys_item, &BTreeSet::<Key>::new())?;
            }

            for index in &store.indexes {
                let index_item = self.index_item(&store.name, &index.name);
                if self.items.get_item(&index_item)?.is_some() {
                    continue;
                }
                tracing::debug!(db = %self.config.name, store = %store.name, index = %index.name, "creating index");
                let keys = self.key_list(&store.name)?;
                let mut records = Vec::with_capacity(keys.len());
                for key in keys {
                    if let Some(record) = self.read_json::<Resource>(&self.record_item(&store.name, &key)?)? {
                        records.push((key, record));
                    }
                }
                let mut table = IndexTable::new();
                table.rebuild(index, records.iter().map(|(key, record)| (key, record)));
                self.write_json(&index_item, &table)?;
            }
        }

        self.write_json(&version_item, &requested.max(stored.unwrap_or(0)))
    }

    fn store_config(&self, store: &str) -> StorageResult<&StoreConfig> {
        self.config
            .find_store(store)
            .ok_or_else(|| StorageError::store_not_found(store))
    }

    fn record_item(&self, store: &str, key: &Key) -> StorageResult<String> {
        Ok(format!(
            "{PREFIX}{}/{store}:{}",
            self.config.name,
            serde_json::to_string(key)?
        ))
    }

    fn keys_item(&self, store: &str) -> String {
        format!("{PREFIX}__{}/{store}", self.config.name)
    }

    fn index_item(&self, store: &str, index: &str) -> String {
        format!("{PREFIX}__{}/{store}#{index}", self.config.name)
    }

    fn read_json<T: DeserializeOwned>(&self, item: &str) -> StorageResult<Option<T>> {
        match self.items.get_item(item)? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|err| StorageError::corrupted(format!("{item}: {err}"))),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&self, item: &str, value: &T) -> StorageResult<()> {
        self.items.set_item(item, serde_json::to_string(value)?)
    }

    fn key_list(&self, store: &str) -> StorageResult<BTreeSet<Key>> {
        Ok(self
            .read_json(&self.keys_item(store))?
            .unwrap_or_default())
    }

    fn index_table(&self, store: &str, index: &str) -> StorageResult<IndexTable> {
        Ok(self
            .read_json(&self.index_item(store, index))?
            .unwrap_or_default())
    }

    fn fetch<I>(&self, store: &str, keys: I) -> StorageResult<Vec<Resource>>
    where
        I: IntoIterator<Item = Key>,
    {
        let mut records = Vec::new();
        for key in keys {
            if let Some(record) = self.read_json(&self.record_item(store, &key)?)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    // Writes `item` and records its previous value in `undo`.
    fn write_undoable<T: Serialize>(
        &self,
        item: String,
        value: &T,
        undo: &mut Undo,
    ) -> StorageResult<()> {
        let before = self.items.get_item(&item)?;
        self.write_json(&item, value)?;
        undo.push((item, before));
        Ok(())
    }

    fn write_entries(
        &self,
        store: &str,
        key: &Key,
        record: &Resource,
        tables: Vec<(&IndexConfig, IndexTable)>,
        undo: &mut Undo,
    ) -> StorageResult<()> {
        self.write_undoable(self.record_item(store, key)?, record, undo)?;

        let mut keys = self.key_list(store)?;
        if keys.insert(key.clone()) {
            self.write_undoable(self.keys_item(store), &keys, undo)?;
        }

        for (index, mut table) in tables {
            table.update(key, field_text(record, index.key_path()));
            self.write_undoable(self.index_item(store, &index.name), &table, undo)?;
        }
        Ok(())
    }

    fn roll_back(&self, undo: Undo) {
        for (item, before) in undo.into_iter().rev() {
            let restored = match before {
                Some(text) => self.items.set_item(&item, text),
                None => self.items.remove_item(&item).map(|_| ()),
            };
            if let Err(err) = restored {
                tracing::error!(db = %self.config.name, item = %item, error = %err, "failed to roll back write");
            }
        }
    }
}

impl Connection for KvConnection {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn get(&self, store: &str, key: &Key) -> StorageResult<Option<Resource>> {
        let _guard = self.lock.read();
        self.store_config(store)?;
        self.read_json(&self.record_item(store, key)?)
    }

    fn set(&self, store: &str, key: &Key, record: Resource) -> StorageResult<Resource> {
        let _guard = self.lock.write();
        let store_config = self.store_config(store)?;

        let mut tables = Vec::with_capacity(store_config.indexes.len());
        for index in &store_config.indexes {
            let table = self.index_table(store, &index.name)?;
            check_unique(store, index, &table, key, &record)?;
            tables.push((index, table));
        }

        let mut undo = Undo::new();
        if let Err(err) = self.write_entries(store, key, &record, tables, &mut undo) {
            tracing::warn!(db = %self.config.name, store, key = %key, error = %err, "write failed, rolling back");
            self.roll_back(undo);
            return Err(err);
        }
        Ok(record)
    }

    fn delete(&self, store: &str, key: &Key) -> StorageResult<bool> {
        let _guard = self.lock.write();
        let store_config = self.store_config(store)?;

        for index in &store_config.indexes {
            let mut table = self.index_table(store, &index.name)?;
            if table.remove(key) {
                self.write_json(&self.index_item(store, &index.name), &table)?;
            }
        }

        let mut keys = self.key_list(store)?;
        if keys.remove(key) {
            self.write_json(&self.keys_item(store), &keys)?;
        }

        self.items.remove_item(&self.record_item(store, key)?)
    }

    fn query(
        &self,
        store: &str,
        index: &str,
        search: &Value,
        options: &SearchOptions,
    ) -> StorageResult<QueryResult> {
        let operator = options.operator_or_default();
        let _guard = self.lock.read();
        let store_config = self.store_config(store)?;

        if store_config.find_index(index).is_none() {
            return Ok(QueryResult::empty(operator));
        }

        let table = self.index_table(store, index)?;
        let matches = self.fetch(store, table.select(&value_text(search), operator))?;
        Ok(QueryResult::shaped(
            operator,
            options.cursor().paginate(matches),
        ))
    }

    fn all(
        &self,
        store: &str,
        index: Option<&str>,
        options: &CursorOptions,
    ) -> StorageResult<Vec<Resource>> {
        let _guard = self.lock.read();
        let store_config = self.store_config(store)?;

        let keys: Vec<Key> = match index {
            Some(name) if store_config.find_index(name).is_none() => Vec::new(),
            Some(name) => self.index_table(store, name)?.ordered_keys(),
            None => self.key_list(store)?.into_iter().collect(),
        };

        Ok(options.paginate(self.fetch(store, keys)?))
    }
}

/// Plugin opening [`KvConnection`]s over a shared item store.
///
/// Connections opened by the same plugin see each other's data and share
/// one lock, so concurrent writes through them never lose index updates.
#[derive(Clone)]
pub struct KvPlugin {
    items: Arc<dyn KeyValueStore>,
    lock: ItemLock,
}

impl KvPlugin {
    /// Registry name of this plugin.
    pub const NAME: &'static str = "kv";

    /// Creates a plugin over `items`.
    pub fn new(items: Arc<dyn KeyValueStore>) -> Self {
        Self {
            items,
            lock: ItemLock::default(),
        }
    }

    /// Creates a plugin over a fresh [`MemoryKeyValueStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }
}

impl ConnectionPlugin for KvPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn setup(&self, config: &DatabaseConfig) -> StorageResult<Arc<dyn Connection>> {
        tracing::debug!(name = %config.name, version = config.version_or_default(), "opening key/value connection");
        Ok(Arc::new(KvConnection::open_locked(
            config.clone(),
            Arc::clone(&self.items),
            Arc::clone(&self.lock),
        )?))
    }
}
