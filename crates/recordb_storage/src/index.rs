//! Ordered secondary index tables.

use crate::config::IndexConfig;
use crate::error::{StorageError, StorageResult};
use crate::key::Key;
use crate::options::Operator;
use crate::types::{field_text, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index value to primary keys, ordered by value.
///
/// Values are kept in ascending string order; keys sharing a value keep
/// their insertion order. A key appears under at most one value.
///
/// Both bundled backends use this table: the memory backend holds it
/// directly, the key/value backend persists it as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexTable {
    entries: BTreeMap<String, Vec<Key>>,
}

impl IndexTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `key` under `value`, or drops it when `value` is `None`.
    pub fn update(&mut self, key: &Key, value: Option<String>) {
        self.remove(key);
        if let Some(value) = value {
            let keys = self.entries.entry(value).or_default();
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }

    /// Removes `key` from whichever value holds it.
    pub fn remove(&mut self, key: &Key) -> bool {
        let mut removed = false;
        self.entries.retain(|_, keys| {
            let before = keys.len();
            keys.retain(|existing| existing != key);
            removed |= keys.len() != before;
            !keys.is_empty()
        });
        removed
    }

    /// Returns the keys stored under an exact value.
    #[must_use]
    pub fn lookup(&self, value: &str) -> &[Key] {
        self.entries.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns keys whose value satisfies `operator`, in ascending value order.
    ///
    /// Comparison is case-insensitive.
    #[must_use]
    pub fn select(&self, search: &str, operator: Operator) -> Vec<Key> {
        let search = search.to_lowercase();
        self.entries
            .iter()
            .filter(|(value, _)| operator.matches(&value.to_lowercase(), &search))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Returns every key in ascending value order.
    #[must_use]
    pub fn ordered_keys(&self) -> Vec<Key> {
        self.entries.values().flatten().cloned().collect()
    }

    /// Returns the number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds the table from existing records.
    pub fn rebuild<'a, I>(&mut self, config: &IndexConfig, records: I)
    where
        I: IntoIterator<Item = (&'a Key, &'a Resource)>,
    {
        self.entries.clear();
        for (key, record) in records {
            self.update(key, field_text(record, config.key_path()));
        }
    }
}

/// Fails if a unique index would map `record`'s value to a second key.
pub fn check_unique(
    store: &str,
    config: &IndexConfig,
    table: &IndexTable,
    key: &Key,
    record: &Resource,
) -> StorageResult<()> {
    if !config.unique {
        return Ok(());
    }
    let Some(value) = field_text(record, config.key_path()) else {
        return Ok(());
    };
    if table.lookup(&value).iter().any(|existing| existing != key) {
        return Err(StorageError::unique_violation(store, &config.name, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(text: &str) -> Key {
        Key::from(text)
    }

    fn names() -> IndexTable {
        let mut table = IndexTable::new();
        table.update(&key("u3"), Some("Charlie".into()));
        table.update(&key("u1"), Some("Alice".into()));
        table.update(&key("u2"), Some("Bob".into()));
        table.update(&key("u4"), Some("Alicia".into()));
        table
    }

    #[test]
    fn ordered_by_value() {
        let table = names();
        assert_eq!(
            table.ordered_keys(),
            vec![key("u1"), key("u4"), key("u2"), key("u3")]
        );
    }

    #[test]
    fn update_moves_key() {
        let mut table = names();
        table.update(&key("u1"), Some("Zed".into()));
        assert!(table.lookup("Alice").is_empty());
        assert_eq!(table.lookup("Zed"), &[key("u1")]);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn update_same_value_keeps_single_entry() {
        let mut table = names();
        table.update(&key("u1"), Some("Alice".into()));
        table.update(&key("u1"), Some("Alice".into()));
        assert_eq!(table.lookup("Alice"), &[key("u1")]);
    }

    #[test]
    fn remove_drops_empty_values() {
        let mut table = names();
        assert!(table.remove(&key("u2")));
        assert!(!table.remove(&key("u2")));
        assert!(table.lookup("Bob").is_empty());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn select_is_case_insensitive() {
        let table = names();
        assert_eq!(
            table.select("ALI", Operator::Includes),
            vec![key("u1"), key("u4")]
        );
        assert_eq!(table.select("alice", Operator::EqualsMany), vec![key("u1")]);
        assert_eq!(table.select("ali", Operator::NotIncludes), vec![key("u2"), key("u3")]);
    }

    #[test]
    fn unique_rejects_second_key() {
        let config = IndexConfig::new("email").unique();
        let mut table = IndexTable::new();
        table.update(&key("u1"), Some("a@x.io".into()));

        let same = json!({"email": "a@x.io"}).as_object().cloned().unwrap();
        assert!(check_unique("users", &config, &table, &key("u1"), &same).is_ok());
        let err = check_unique("users", &config, &table, &key("u2"), &same).unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));
    }

    #[test]
    fn serializes_as_object() {
        let mut table = IndexTable::new();
        table.update(&Key::Int(1), Some("a".into()));
        table.update(&key("x"), Some("a".into()));
        let text = serde_json::to_string(&table).unwrap();
        assert_eq!(text, r#"{"a":[1,"x"]}"#);
    }
}
