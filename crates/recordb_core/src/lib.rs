//! # recordb Core
//!
//! Active-record object mapping over the recordb storage protocol.
//!
//! This crate provides:
//! - [`Schema`] and the [`Record`] trait describing record types
//! - [`Model`], the active record with hydrate/save/delete, queries and
//!   relationship preloading
//! - [`Context`], carrying the connection, event bus and page size
//! - [`Registry`], opening and caching named connections through plugins
//! - [`EventBus`] for setup and operation failures
//! - [`Collector`] for bulk work over query results
//!
//! ## Quick Start
//!
//! ```rust
//! use recordb_core::{Record, Registry, Relationship};
//! use recordb_storage::{DatabaseConfig, SearchOptions, StoreConfig};
//!
//! struct User;
//! struct Post;
//!
//! impl Record for User {
//!     fn store_name() -> &'static str { "users" }
//!     fn relationships() -> Vec<(&'static str, Relationship)> {
//!         vec![("posts", Relationship::many(Post::schema, "user_id"))]
//!     }
//! }
//!
//! impl Record for Post {
//!     fn store_name() -> &'static str { "posts" }
//! }
//!
//! let registry = Registry::new();
//! registry
//!     .initialize(
//!         &DatabaseConfig::new("blog")
//!             .store(StoreConfig::new("users").indexed(["name"]))
//!             .store(StoreConfig::new("posts").indexed(["user_id"])),
//!     )
//!     .unwrap();
//!
//! let mut alice = registry.record::<User>().unwrap();
//! alice.set_attribute("id", "u1").set_attribute("name", "Alice").save().unwrap();
//!
//! let mut post = registry.record::<Post>().unwrap();
//! post.set_attribute("user_id", "u1").save().unwrap();
//!
//! let users = registry.record::<User>().unwrap().with("posts").unwrap();
//! let found = users.many("name", "ali", SearchOptions::new()).unwrap();
//! assert_eq!(found[0].relation("posts").unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collector;
mod context;
mod error;
mod events;
mod model;
mod params;
mod registry;
mod schema;

pub use collector::{collect, Collector};
pub use context::{Context, DEFAULT_PER_PAGE};
pub use error::{CoreError, CoreResult};
pub use events::{EventBus, Listener, SubscriptionId, DB_INIT_ERROR, MODEL_OP_ERROR};
pub use model::{Model, Related, GENERATED_KEY_PREFIX};
pub use params::{ParamBag, SyncMeta, PARAMS_KEY};
pub use registry::{Registry, DEFAULT_PLUGIN};
pub use schema::{Cardinality, Record, Relationship, Schema, SchemaFactory, DEFAULT_KEY_FIELD};

// Re-export storage types used throughout the public API.
pub use recordb_storage::{
    Connection, ConnectionPlugin, CursorOptions, DatabaseConfig, Direction, IndexConfig, Key,
    Operator, QueryResult, Resource, SearchOptions, StorageError, StoreConfig,
};
