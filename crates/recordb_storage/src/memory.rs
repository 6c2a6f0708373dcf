//! In-memory connection backend.

use crate::config::{DatabaseConfig, IndexConfig};
use crate::connection::{Connection, ConnectionPlugin};
use crate::error::{StorageError, StorageResult};
use crate::index::{check_unique, IndexTable};
use crate::key::Key;
use crate::options::{CursorOptions, QueryResult, SearchOptions};
use crate::types::{field_text, value_text, Resource};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Records and indexes of one store.
#[derive(Debug, Default)]
struct MemoryStore {
    records: BTreeMap<Key, Resource>,
    indexes: Vec<(IndexConfig, IndexTable)>,
}

impl MemoryStore {
    fn index(&self, name: &str) -> Option<&IndexTable> {
        self.indexes
            .iter()
            .find(|(config, _)| config.name == name)
            .map(|(_, table)| table)
    }

    fn fetch(&self, keys: Vec<Key>) -> Vec<Resource> {
        keys.iter()
            .filter_map(|key| self.records.get(key).cloned())
            .collect()
    }
}

/// A connection holding every store in memory.
///
/// This backend is suitable for:
/// - Unit and integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// All stores sit behind one lock; a write updates the record and all of
/// its index entries before the lock is released.
///
/// # Example
///
/// ```rust
/// use recordb_storage::{Connection, DatabaseConfig, Key, MemoryConnection, StoreConfig};
/// use serde_json::json;
///
/// let config = DatabaseConfig::new("app").store(StoreConfig::new("users").indexed(["name"]));
/// let conn = MemoryConnection::open(config);
///
/// let record = json!({"id": "u1", "name": "Alice"}).as_object().cloned().unwrap();
/// conn.set("users", &Key::from("u1"), record).unwrap();
/// assert!(conn.get("users", &Key::from("u1")).unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct MemoryConnection {
    config: DatabaseConfig,
    stores: RwLock<HashMap<String, MemoryStore>>,
}

impl MemoryConnection {
    /// Opens a connection with empty stores for every declared store.
    #[must_use]
    pub fn open(config: DatabaseConfig) -> Self {
        let stores = config
            .stores
            .iter()
            .map(|store| {
                let indexes = store
                    .indexes
                    .iter()
                    .map(|index| (index.clone(), IndexTable::new()))
                    .collect();
                (
                    store.name.clone(),
                    MemoryStore {
                        records: BTreeMap::new(),
                        indexes,
                    },
                )
            })
            .collect();

        Self {
            config,
            stores: RwLock::new(stores),
        }
    }

    /// Returns the number of records in a store.
    pub fn len(&self, store: &str) -> StorageResult<usize> {
        let stores = self.stores.read();
        let data = stores
            .get(store)
            .ok_or_else(|| StorageError::store_not_found(store))?;
        Ok(data.records.len())
    }

    /// Returns true if a store holds no records.
    pub fn is_empty(&self, store: &str) -> StorageResult<bool> {
        Ok(self.len(store)? == 0)
    }
}

impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn get(&self, store: &str, key: &Key) -> StorageResult<Option<Resource>> {
        let stores = self.stores.read();
        let data = stores
            .get(store)
            .ok_or_else(|| StorageError::store_not_found(store))?;
        Ok(data.records.get(key).cloned())
    }

    fn set(&self, store: &str, key: &Key, record: Resource) -> StorageResult<Resource> {
        let mut stores = self.stores.write();
        let data = stores
            .get_mut(store)
            .ok_or_else(|| StorageError::store_not_found(store))?;

        for (config, table) in &data.indexes {
            check_unique(store, config, table, key, &record)?;
        }
        for (config, table) in &mut data.indexes {
            table.update(key, field_text(&record, config.key_path()));
        }
        data.records.insert(key.clone(), record.clone());

        Ok(record)
    }

    fn delete(&self, store: &str, key: &Key) -> StorageResult<bool> {
        let mut stores = self.stores.write();
        let data = stores
            .get_mut(store)
            .ok_or_else(|| StorageError::store_not_found(store))?;

        for (_, table) in &mut data.indexes {
            table.remove(key);
        }
        Ok(data.records.remove(key).is_some())
    }

    fn query(
        &self,
        store: &str,
        index: &str,
        search: &Value,
        options: &SearchOptions,
    ) -> StorageResult<QueryResult> {
        let operator = options.operator_or_default();
        let stores = self.stores.read();
        let data = stores
            .get(store)
            .ok_or_else(|| StorageError::store_not_found(store))?;

        let Some(table) = data.index(index) else {
            return Ok(QueryResult::empty(operator));
        };

        let matches = data.fetch(table.select(&value_text(search), operator));
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
        let stores = self.stores.read();
        let data = stores
            .get(store)
            .ok_or_else(|| StorageError::store_not_found(store))?;

        let records = match index {
            Some(name) => match data.index(name) {
                Some(table) => data.fetch(table.ordered_keys()),
                None => Vec::new(),
            },
            None => data.records.values().cloned().collect(),
        };

        Ok(options.paginate(records))
    }
}

/// Plugin opening [`MemoryConnection`]s.
///
/// Every `setup` call creates fresh, empty stores.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryPlugin;

impl MemoryPlugin {
    /// Registry name of this plugin.
    pub const NAME: &'static str = "memory";
}

impl ConnectionPlugin for MemoryPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn setup(&self, config: &DatabaseConfig) -> StorageResult<Arc<dyn Connection>> {
        tracing::debug!(name = %config.name, stores = config.stores.len(), "opening memory connection");
        Ok(Arc::new(MemoryConnection::open(config.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::options::{Direction, Operator};
    use serde_json::json;

    fn record(value: Value) -> Resource {
        value.as_object().cloned().unwrap()
    }

    fn users() -> MemoryConnection {
        let config = DatabaseConfig::new("memory-test").store(
            StoreConfig::new("users")
                .index(IndexConfig::new("email").unique())
                .indexed(["name"]),
        );
        let conn = MemoryConnection::open(config);
        for (id, name) in [("u1", "Alice"), ("u2", "Bob"), ("u3", "Charlie")] {
            let email = format!("{}@test.com", name.to_lowercase());
            conn.set(
                "users",
                &Key::from(id),
                record(json!({"id": id, "name": name, "email": email})),
            )
            .unwrap();
        }
        conn
    }

    fn names(records: &[Resource]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r.get("name").and_then(Value::as_str).unwrap())
            .collect()
    }

    #[test]
    fn set_then_get() {
        let conn = users();
        let found = conn.get("users", &Key::from("u2")).unwrap().unwrap();
        assert_eq!(found["name"], "Bob");
        assert!(conn.get("users", &Key::from("nope")).unwrap().is_none());
    }

    #[test]
    fn unknown_store_fails() {
        let conn = users();
        let err = conn.get("ghosts", &Key::from("x")).unwrap_err();
        assert!(matches!(err, StorageError::StoreNotFound { .. }));
        assert!(conn
            .set("ghosts", &Key::from("x"), Resource::new())
            .is_err());
    }

    #[test]
    fn delete_removes_index_entries() {
        let conn = users();
        assert!(conn.delete("users", &Key::from("u1")).unwrap());
        assert!(!conn.delete("users", &Key::from("u1")).unwrap());

        let found = conn
            .query("users", "name", &json!("alice"), &SearchOptions::new())
            .unwrap();
        assert_eq!(found, QueryResult::Single(None));
        assert_eq!(conn.len("users").unwrap(), 2);
    }

    #[test]
    fn reindexes_on_update() {
        let conn = users();
        conn.set(
            "users",
            &Key::from("u1"),
            record(json!({"id": "u1", "name": "Zoe", "email": "alice@test.com"})),
        )
        .unwrap();

        let by_old = conn
            .query("users", "name", &json!("Alice"), &SearchOptions::new())
            .unwrap();
        assert_eq!(by_old.into_single(), None);

        let ordered = conn.all("users", Some("name"), &CursorOptions::new()).unwrap();
        assert_eq!(names(&ordered), vec!["Bob", "Charlie", "Zoe"]);
    }

    #[test]
    fn unique_violation_writes_nothing() {
        let conn = users();
        let err = conn
            .set(
                "users",
                &Key::from("u9"),
                record(json!({"id": "u9", "name": "Eve", "email": "bob@test.com"})),
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));
        assert!(conn.get("users", &Key::from("u9")).unwrap().is_none());

        let eve = conn
            .query("users", "name", &json!("eve"), &SearchOptions::new())
            .unwrap();
        assert_eq!(eve.into_single(), None);
    }

    #[test]
    fn equals_is_case_insensitive_single() {
        let conn = users();
        let found = conn
            .query("users", "name", &json!("BOB"), &SearchOptions::new())
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(found["id"], "u2");
    }

    #[test]
    fn unknown_index_is_empty() {
        let conn = users();
        let single = conn
            .query("users", "age", &json!("1"), &SearchOptions::new())
            .unwrap();
        assert_eq!(single, QueryResult::Single(None));

        let many = conn
            .query(
                "users",
                "age",
                &json!("1"),
                &SearchOptions::new().operator(Operator::Includes),
            )
            .unwrap();
        assert_eq!(many, QueryResult::Many(Vec::new()));
        assert!(conn
            .all("users", Some("age"), &CursorOptions::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn all_in_primary_order_with_window() {
        let conn = users();
        let first = conn.all("users", None, &CursorOptions::new().limit(2)).unwrap();
        assert_eq!(names(&first), vec!["Alice", "Bob"]);

        let rest = conn
            .all("users", None, &CursorOptions::new().limit(2).offset(2))
            .unwrap();
        assert_eq!(names(&rest), vec!["Charlie"]);

        let reversed = conn
            .all(
                "users",
                None,
                &CursorOptions::new().direction(Direction::Desc),
            )
            .unwrap();
        assert_eq!(names(&reversed), vec!["Charlie", "Bob", "Alice"]);
    }

    #[test]
    fn plugin_opens_fresh_connection() {
        let config = DatabaseConfig::new("fresh").store(StoreConfig::new("users"));
        let conn = MemoryPlugin.setup(&config).unwrap();
        assert_eq!(conn.name(), "fresh");
        assert!(conn
            .all("users", None, &CursorOptions::new())
            .unwrap()
            .is_empty());
    }
}
