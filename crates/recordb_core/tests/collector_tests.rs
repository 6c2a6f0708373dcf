//! Collector helpers over real queries.

use recordb_core::{collect, CursorOptions};
use recordb_testkit::prelude::*;
use serde_json::json;

#[test]
fn count_then_delete_empties_store() {
    with_each_backend(|plugin, context| {
        scenarios::seed_users(context);
        let users = context.record::<User>();

        assert_eq!(collect(|| users.all(None, CursorOptions::new())).count().unwrap(), 3, "{plugin}");
        assert!(collect(|| users.all(None, CursorOptions::new())).delete().unwrap());
        assert!(users.all(None, CursorOptions::new()).unwrap().is_empty());

        let email = users.find("email", "bob@test.com").unwrap();
        assert!(email.is_none(), "{plugin}");
    });
}

#[test]
fn items_as_resources_are_plain_maps() {
    with_memory_db(|context| {
        scenarios::seed_users(context);
        let users = context.record::<User>().with("posts").unwrap();

        let plain = collect(|| users.all(None, CursorOptions::new()))
            .items_as_resources()
            .unwrap();
        assert_eq!(plain.len(), 3);
        assert_eq!(plain[2]["name"], json!("Charlie"));
        assert!(plain.iter().all(|r| !r.contains_key("posts")));
    });
}

#[test]
fn each_can_mutate_and_save() {
    with_memory_db(|context| {
        scenarios::seed_users(context);
        let users = context.record::<User>();

        collect(|| users.all(None, CursorOptions::new()))
            .each(|user| {
                let mut user = user.clone();
                user.set_attribute("active", true);
                user.save()?;
                Ok(())
            })
            .unwrap();

        let all = users.all(None, CursorOptions::new()).unwrap();
        assert!(all.iter().all(|u| u.attribute("active") == Some(&json!(true))));
    });
}
