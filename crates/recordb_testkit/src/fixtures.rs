//! Test fixtures and database helpers.
//!
//! Provides the record types used across the test suites and
//! convenience functions for opening test databases on each backend.

use recordb_core::{Context, Model, Record, Registry, Relationship};
use recordb_storage::{
    DatabaseConfig, IndexConfig, KvPlugin, MemoryPlugin, Resource, StoreConfig,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A user with many posts and one profile.
pub struct User;

impl Record for User {
    fn store_name() -> &'static str {
        "users"
    }

    fn relationships() -> Vec<(&'static str, Relationship)> {
        vec![
            ("posts", Relationship::many(Post::schema, "user_id")),
            ("profile", Relationship::one(Profile::schema, "user_id")),
        ]
    }
}

/// A post belonging to a user.
pub struct Post;

impl Record for Post {
    fn store_name() -> &'static str {
        "posts"
    }

    fn relationships() -> Vec<(&'static str, Relationship)> {
        vec![("user", Relationship::belongs(User::schema, "user_id"))]
    }
}

/// A profile pointing at its user.
pub struct Profile;

impl Record for Profile {
    fn store_name() -> &'static str {
        "profiles"
    }

    fn relationships() -> Vec<(&'static str, Relationship)> {
        vec![("user", Relationship::belongs(User::schema, "user_id"))]
    }
}

/// A record keyed by `slug` with a projection.
pub struct Slug;

impl Record for Slug {
    fn store_name() -> &'static str {
        "slugs"
    }

    fn key_field() -> &'static str {
        "slug"
    }

    fn fields() -> Option<&'static [&'static str]> {
        Some(&["slug", "title"])
    }
}

/// Configuration declaring every fixture store.
pub fn blog_config(name: &str) -> DatabaseConfig {
    DatabaseConfig::new(name)
        .version(1)
        .store(
            StoreConfig::new("users")
                .index(IndexConfig::new("email").unique())
                .indexed(["name"]),
        )
        .store(StoreConfig::new("posts").indexed(["title", "user_id"]))
        .store(
            StoreConfig::new("profiles")
                .indexed(["user_id"])
                .index(IndexConfig::new("city").path("address.city")),
        )
        .store(StoreConfig::new("slugs").indexed(["title"]))
}

/// Converts a JSON object literal into a [`Resource`].
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn resource(value: Value) -> Resource {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn unique_name(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// A test database with its own registry.
pub struct TestDatabase {
    /// The registry holding the connection.
    pub registry: Registry,
    /// Context over the connection.
    pub context: Context,
}

impl TestDatabase {
    /// Opens the fixture stores through the plugin named `plugin`.
    pub fn with_plugin(plugin: &str) -> Self {
        let registry = Registry::new();
        let config = blog_config(&unique_name(plugin)).plugin(plugin);
        registry
            .initialize(&config)
            .expect("Failed to open test database");
        let context = registry.context().expect("Default connection missing");
        Self { registry, context }
    }

    /// Opens an in-memory test database.
    pub fn memory() -> Self {
        Self::with_plugin(MemoryPlugin::NAME)
    }

    /// Opens a test database over an in-memory key/value store.
    pub fn kv() -> Self {
        Self::with_plugin(KvPlugin::NAME)
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_memory_db<F, R>(f: F) -> R
where
    F: FnOnce(&Context) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.context)
}

/// Runs a test with a temporary key/value database.
pub fn with_kv_db<F, R>(f: F) -> R
where
    F: FnOnce(&Context) -> R,
{
    let test_db = TestDatabase::kv();
    f(&test_db.context)
}

/// Runs a test once per bundled backend.
pub fn with_each_backend<F>(mut f: F)
where
    F: FnMut(&str, &Context),
{
    for plugin in [MemoryPlugin::NAME, KvPlugin::NAME] {
        let test_db = TestDatabase::with_plugin(plugin);
        f(plugin, &test_db.context);
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Saves a record of type `R` built from `value`.
    pub fn insert<R: Record>(context: &Context, value: Value) -> Model {
        let mut model = context.record::<R>();
        model.hydrate(resource(value));
        model.save().expect("Failed to save fixture");
        model
    }

    /// Saves Alice, Bob and Charlie with ids `u1`..`u3`.
    pub fn seed_users(context: &Context) -> Vec<Model> {
        [("u1", "Alice"), ("u2", "Bob"), ("u3", "Charlie")]
            .into_iter()
            .map(|(id, name)| {
                insert::<User>(
                    context,
                    json!({
                        "id": id,
                        "name": name,
                        "email": format!("{}@test.com", name.to_lowercase()),
                    }),
                )
            })
            .collect()
    }

    /// Saves `count` posts owned by `user_id`.
    pub fn seed_posts(context: &Context, user_id: &str, count: usize) -> Vec<Model> {
        (1..=count)
            .map(|n| {
                insert::<Post>(
                    context,
                    json!({
                        "id": format!("{user_id}-p{n}"),
                        "title": format!("Post {n}"),
                        "user_id": user_id,
                    }),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordb_storage::CursorOptions;

    #[test]
    fn test_memory_database() {
        let test_db = TestDatabase::memory();
        assert!(test_db.connection().name().starts_with("memory-"));
    }

    #[test]
    fn test_each_backend_seeds() {
        let mut seen = Vec::new();
        with_each_backend(|plugin, context| {
            scenarios::seed_users(context);
            let all = context
                .record::<User>()
                .all(None, CursorOptions::new())
                .unwrap();
            assert_eq!(all.len(), 3, "{plugin}");
            seen.push(plugin.to_string());
        });
        assert_eq!(seen, vec!["memory", "kv"]);
    }

    #[test]
    #[should_panic(expected = "expected a JSON object")]
    fn test_resource_rejects_non_objects() {
        resource(json!([1, 2]));
    }
}
