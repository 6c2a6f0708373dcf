//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, index values and records.

use proptest::prelude::*;
use recordb_storage::{Key, Resource};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Strategy for generating non-empty keys of both kinds.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        any::<i64>().prop_map(Key::Int),
        prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
            .expect("Invalid regex")
            .prop_map(Key::Text),
    ]
}

/// Strategy for generating mixed-case index values.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z]{1,8}( [A-Za-z]{1,8})?").expect("Invalid regex")
}

/// Strategy for generating a short search needle.
pub fn needle_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z]{0,3}").expect("Invalid regex")
}

/// Strategy for generating a set of distinct names.
pub fn distinct_names_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(name_strategy(), 0..max)
        .prop_map(|names: BTreeSet<String>| names.into_iter().collect())
}

/// Strategy for generating user records keyed `u{n}`.
pub fn users_strategy(max: usize) -> impl Strategy<Value = Vec<Resource>> {
    prop::collection::vec(name_strategy(), 0..max).prop_map(|names| {
        names
            .into_iter()
            .enumerate()
            .map(|(n, name)| user_record(&format!("u{n:03}"), &name))
            .collect()
    })
}

/// Builds a user record.
pub fn user_record(id: &str, name: &str) -> Resource {
    let mut record = Resource::new();
    record.insert("id".into(), json!(id));
    record.insert("name".into(), Value::String(name.to_string()));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_key_strategy_never_empty() {
        let mut runner = TestRunner::default();
        for _ in 0..100 {
            let key = key_strategy().new_tree(&mut runner).unwrap().current();
            assert!(!key.is_empty());
        }
    }

    #[test]
    fn test_users_have_distinct_ids() {
        let mut runner = TestRunner::default();
        let users = users_strategy(20).new_tree(&mut runner).unwrap().current();
        let ids: BTreeSet<_> = users.iter().map(|u| u["id"].clone().to_string()).collect();
        assert_eq!(ids.len(), users.len());
    }
}
