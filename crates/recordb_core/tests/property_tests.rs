//! Property tests for query and lifecycle invariants.

use proptest::prelude::*;
use recordb_core::{CursorOptions, Direction, Operator, SearchOptions};
use recordb_testkit::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn seed(context: &recordb_core::Context, users: &[recordb_core::Resource]) {
    for data in users {
        let mut user = context.record::<User>();
        user.hydrate(data.clone());
        user.save().unwrap();
    }
}

fn ids(models: &[recordb_core::Model]) -> Vec<String> {
    models
        .iter()
        .map(|m| m.attribute("id").and_then(Value::as_str).unwrap().to_string())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn includes_matches_lowercase_substring(users in users_strategy(12), needle in needle_strategy()) {
        with_memory_db(|context| {
            seed(context, &users);
            let found = context
                .record::<User>()
                .many("name", needle.clone(), SearchOptions::new().operator(Operator::Includes).limit(0))
                .unwrap();

            let expected: BTreeSet<String> = users
                .iter()
                .filter(|u| u["name"].as_str().unwrap().to_lowercase().contains(&needle.to_lowercase()))
                .map(|u| u["id"].as_str().unwrap().to_string())
                .collect();
            let actual: BTreeSet<String> = ids(&found).into_iter().collect();
            prop_assert_eq!(actual, expected);
            Ok(())
        })?;
    }

    #[test]
    fn index_windows_partition_the_scan(
        users in users_strategy(15),
        limit in 1usize..5,
        desc in any::<bool>(),
    ) {
        with_kv_db(|context| {
            seed(context, &users);
            let users_model = context.record::<User>();
            let direction = if desc { Direction::Desc } else { Direction::Asc };

            let full = users_model
                .all(Some("name"), CursorOptions::new().direction(direction).limit(0))
                .unwrap();
            prop_assert_eq!(full.len(), users.len());

            let mut windows = Vec::new();
            let mut offset = 0;
            loop {
                let page = users_model
                    .all(Some("name"), CursorOptions::new().direction(direction).limit(limit).offset(offset))
                    .unwrap();
                prop_assert!(page.len() <= limit);
                if page.is_empty() {
                    break;
                }
                offset += page.len();
                windows.extend(page);
            }
            prop_assert_eq!(ids(&windows), ids(&full));
            Ok(())
        })?;
    }

    #[test]
    fn hydrate_is_clean_and_mutation_dirties(key in key_strategy(), name in name_strategy()) {
        with_memory_db(|context| {
            let mut user = context.record::<User>();
            user.hydrate(resource(json!({"id": key.to_value(), "name": name})));
            prop_assert!(user.is_clean());
            prop_assert!(user.is_new() == key.as_text().starts_with("generated"));

            user.set_attribute("name", format!("{name}!"));
            prop_assert!(user.is_dirty());
            Ok(())
        })?;
    }

    #[test]
    fn save_then_get_round_trips(key in key_strategy(), name in name_strategy()) {
        with_each_backend(|_, context| {
            let mut user = context.record::<User>();
            user.hydrate(resource(json!({"id": key.to_value(), "name": name})));
            user.save().unwrap();

            let stored = context.record::<User>().get(key.clone()).unwrap().unwrap();
            assert_eq!(stored.attributes(), user.attributes());
        });
    }
}
