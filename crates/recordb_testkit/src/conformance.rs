//! Connection conformance suite.
//!
//! Every backend must give the same answers to the same calls. Each check
//! receives a connection opened on [`blog_config`] with empty stores;
//! [`run_all`] opens a fresh connection per check.
//!
//! ```rust
//! use recordb_storage::MemoryConnection;
//! use recordb_testkit::conformance;
//! use std::sync::Arc;
//!
//! conformance::run_all(&|config| Arc::new(MemoryConnection::open(config)));
//! ```

use crate::fixtures::{blog_config, resource};
use recordb_storage::{
    Connection, CursorOptions, DatabaseConfig, Direction, Key, Operator, QueryResult, Resource,
    SearchOptions, StorageError,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Opens a connection for a configuration.
pub type Opener<'a> = &'a dyn Fn(DatabaseConfig) -> Arc<dyn Connection>;

/// Runs every check against fresh connections from `open`.
pub fn run_all(open: Opener<'_>) {
    let checks: [(&str, fn(&dyn Connection)); 10] = [
        ("set_get_delete", set_get_delete),
        ("key_normalization", key_normalization),
        ("operators", operators),
        ("query_window", query_window),
        ("reindex_on_update", reindex_on_update),
        ("scan_windows", scan_windows),
        ("index_order", index_order),
        ("unknown_store_and_index", unknown_store_and_index),
        ("unique_violation", unique_violation),
        ("index_paths", index_paths),
    ];

    for (name, check) in checks {
        let connection = open(blog_config(&format!("conformance-{name}")));
        check(connection.as_ref());
    }
}

fn put(conn: &dyn Connection, store: &str, id: &str, value: Value) {
    conn.set(store, &Key::from(id), resource(value))
        .expect("Failed to set record");
}

fn seed_names(conn: &dyn Connection) {
    for (id, name) in [("u1", "Alice"), ("u2", "Alicia"), ("u3", "Bob")] {
        put(conn, "users", id, json!({"id": id, "name": name}));
    }
}

fn ids(records: &[Resource]) -> Vec<&str> {
    records
        .iter()
        .map(|r| r.get("id").and_then(Value::as_str).unwrap_or_default())
        .collect()
}

fn search(conn: &dyn Connection, index: &str, value: &str, options: SearchOptions) -> QueryResult {
    conn.query("users", index, &json!(value), &options)
        .expect("Failed to query")
}

/// A written record reads back; delete reports whether it removed one.
pub fn set_get_delete(conn: &dyn Connection) {
    put(conn, "users", "u1", json!({"id": "u1", "name": "Ann"}));
    let found = conn.get("users", &Key::from("u1")).unwrap();
    assert_eq!(found, Some(resource(json!({"id": "u1", "name": "Ann"}))));

    assert!(conn.delete("users", &Key::from("u1")).unwrap());
    assert_eq!(conn.get("users", &Key::from("u1")).unwrap(), None);
    assert!(!conn.delete("users", &Key::from("u1")).unwrap());
}

/// Numeric text, integers and truncated floats address the same record.
pub fn key_normalization(conn: &dyn Connection) {
    conn.set("users", &Key::from("42"), resource(json!({"id": 42})))
        .unwrap();
    assert!(conn.get("users", &Key::from(42_i64)).unwrap().is_some());
    assert!(conn.get("users", &Key::from(&json!(42.9))).unwrap().is_some());
    assert!(conn.get("users", &Key::from("42abc")).unwrap().is_none());
}

/// All five operators compare case-insensitively.
pub fn operators(conn: &dyn Connection) {
    seed_names(conn);
    let with = |operator: Operator| SearchOptions::new().operator(operator);

    let single = search(conn, "name", "alice", SearchOptions::new()).into_single();
    assert_eq!(single.as_ref().and_then(|r| r.get("id")), Some(&json!("u1")));

    let cases = [
        (Operator::EqualsMany, "ALICE", vec!["u1"]),
        (Operator::Includes, "ali", vec!["u1", "u2"]),
        (Operator::NotEquals, "alice", vec!["u2", "u3"]),
        (Operator::NotIncludes, "ALI", vec!["u3"]),
    ];
    for (operator, value, expected) in cases {
        let result = search(conn, "name", value, with(operator));
        assert!(matches!(result, QueryResult::Many(_)), "{operator:?}");
        assert_eq!(ids(&result.into_many()), expected, "{operator:?} {value}");
    }

    let none = search(conn, "name", "zed", SearchOptions::new());
    assert_eq!(none, QueryResult::Single(None));
}

/// Offset skips matches and limit caps them; desc reverses first.
pub fn query_window(conn: &dyn Connection) {
    seed_names(conn);
    let everyone = SearchOptions::new().operator(Operator::NotEquals);

    let page = search(conn, "name", "nobody", everyone.limit(1).offset(1)).into_many();
    assert_eq!(ids(&page), vec!["u2"]);

    let reversed = search(conn, "name", "nobody", everyone.direction(Direction::Desc)).into_many();
    assert_eq!(ids(&reversed), vec!["u3", "u2", "u1"]);

    let unlimited = search(conn, "name", "nobody", everyone.limit(0)).into_many();
    assert_eq!(unlimited.len(), 3);
}

/// Overwriting a record moves its index entries.
pub fn reindex_on_update(conn: &dyn Connection) {
    seed_names(conn);
    put(conn, "users", "u1", json!({"id": "u1", "name": "Zoe"}));

    let old = search(conn, "name", "alice", SearchOptions::new());
    assert_eq!(old, QueryResult::Single(None));

    let new = search(conn, "name", "zoe", SearchOptions::new()).into_single();
    assert!(new.is_some());

    conn.delete("users", &Key::from("u1")).unwrap();
    let gone = search(conn, "name", "zoe", SearchOptions::new().operator(Operator::EqualsMany));
    assert!(gone.into_many().is_empty());
}

/// Consecutive windows of a scan partition the unlimited scan.
pub fn scan_windows(conn: &dyn Connection) {
    for n in 0..7 {
        let id = format!("u{n}");
        put(conn, "users", &id, json!({"id": id, "name": format!("user {n}")}));
    }

    let full = conn.all("users", None, &CursorOptions::new()).unwrap();
    assert_eq!(full.len(), 7);

    let mut windows = Vec::new();
    for offset in (0..7).step_by(3) {
        windows.extend(
            conn.all("users", None, &CursorOptions::new().limit(3).offset(offset))
                .unwrap(),
        );
    }
    assert_eq!(windows, full);

    let mut reversed = conn
        .all("users", None, &CursorOptions::new().direction(Direction::Desc))
        .unwrap();
    reversed.reverse();
    assert_eq!(reversed, full);
}

/// Index scans are ordered by the index value.
pub fn index_order(conn: &dyn Connection) {
    for (id, name) in [("u1", "Charlie"), ("u2", "Alice"), ("u3", "Bob")] {
        put(conn, "users", id, json!({"id": id, "name": name}));
    }
    let ordered = conn.all("users", Some("name"), &CursorOptions::new()).unwrap();
    assert_eq!(ids(&ordered), vec!["u2", "u3", "u1"]);
}

/// Undeclared stores fail; undeclared indexes are empty.
pub fn unknown_store_and_index(conn: &dyn Connection) {
    let err = conn.get("ghosts", &Key::from("x")).unwrap_err();
    assert!(matches!(err, StorageError::StoreNotFound { .. }));
    assert!(conn.set("ghosts", &Key::from("x"), Resource::new()).is_err());
    assert!(conn.delete("ghosts", &Key::from("x")).is_err());
    assert!(conn.all("ghosts", None, &CursorOptions::new()).is_err());

    seed_names(conn);
    assert_eq!(
        search(conn, "age", "1", SearchOptions::new()),
        QueryResult::Single(None)
    );
    assert_eq!(
        search(conn, "age", "1", SearchOptions::new().operator(Operator::Includes)),
        QueryResult::Many(Vec::new())
    );
    assert!(conn
        .all("users", Some("age"), &CursorOptions::new())
        .unwrap()
        .is_empty());
}

/// A unique index rejects a second record with the same value.
pub fn unique_violation(conn: &dyn Connection) {
    put(conn, "users", "u1", json!({"id": "u1", "email": "a@test.com"}));
    put(conn, "users", "u1", json!({"id": "u1", "email": "a@test.com", "name": "same key"}));

    let err = conn
        .set("users", &Key::from("u2"), resource(json!({"id": "u2", "email": "a@test.com"})))
        .unwrap_err();
    assert!(matches!(err, StorageError::UniqueViolation { .. }));
    assert_eq!(conn.get("users", &Key::from("u2")).unwrap(), None);
}

/// An index reads its declared path, which may be dotted.
pub fn index_paths(conn: &dyn Connection) {
    put(conn, "profiles", "p1", json!({"id": "p1", "address": {"city": "Lagos"}}));
    put(conn, "profiles", "p2", json!({"id": "p2", "address": {"city": "Accra"}}));
    put(conn, "profiles", "p3", json!({"id": "p3", "city": "Lagos"}));

    let found = conn
        .query("profiles", "city", &json!("LAGOS"), &SearchOptions::new())
        .expect("Failed to query")
        .into_single();
    assert_eq!(found.as_ref().and_then(|r| r.get("id")), Some(&json!("p1")));

    let ordered = conn.all("profiles", Some("city"), &CursorOptions::new()).unwrap();
    assert_eq!(ids(&ordered), vec!["p2", "p1"]);

    put(conn, "profiles", "p1", json!({"id": "p1", "address": {"city": "Abuja"}}));
    let moved = conn
        .query("profiles", "city", &json!("abuja"), &SearchOptions::new().operator(Operator::EqualsMany))
        .expect("Failed to query")
        .into_many();
    assert_eq!(ids(&moved), vec!["p1"]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordb_storage::{KvConnection, MemoryConnection, MemoryKeyValueStore};

    #[test]
    fn memory_connection_conforms() {
        run_all(&|config| Arc::new(MemoryConnection::open(config)));
    }

    #[test]
    fn kv_connection_conforms() {
        run_all(&|config| {
            let items = Arc::new(MemoryKeyValueStore::new());
            Arc::new(KvConnection::open(config, items).expect("Failed to open kv connection"))
        });
    }
}
