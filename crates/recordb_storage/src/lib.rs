//! # recordb Storage
//!
//! Storage connection protocol and bundled backends for recordb.
//!
//! A [`Connection`] persists JSON records under normalized [`Key`]s in
//! named stores, maintains declared secondary indexes, and answers indexed
//! queries. Every backend reproduces the same query semantics:
//!
//! - Five match operators ([`Operator`]), all case-insensitive
//! - `offset` skips matches, `limit` caps them, `direction` reverses order
//! - Index order is ascending by index value; primary order by [`Key`]
//!
//! ## Available Backends
//!
//! - [`MemoryConnection`] - in-memory maps, opened by [`MemoryPlugin`]
//! - [`KvConnection`] - JSON documents in a flat [`KeyValueStore`], opened
//!   by [`KvPlugin`]
//!
//! A [`WorkerKeyValueStore`] serves any [`KeyValueStore`] from a worker
//! thread and bounds each request's wait.
//!
//! ## Example
//!
//! ```rust
//! use recordb_storage::{
//!     Connection, DatabaseConfig, Key, MemoryConnection, Operator, SearchOptions, StoreConfig,
//! };
//! use serde_json::json;
//!
//! let config = DatabaseConfig::new("app").store(StoreConfig::new("users").indexed(["name"]));
//! let conn = MemoryConnection::open(config);
//!
//! for (id, name) in [("u1", "Alice"), ("u2", "Alicia"), ("u3", "Bob")] {
//!     let record = json!({"id": id, "name": name}).as_object().cloned().unwrap();
//!     conn.set("users", &Key::from(id), record).unwrap();
//! }
//!
//! let options = SearchOptions::new().operator(Operator::Includes);
//! let found = conn.query("users", "name", &json!("ALI"), &options).unwrap();
//! assert_eq!(found.into_many().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod error;
mod index;
mod key;
mod kv;
mod memory;
mod options;
mod types;
mod worker;

pub use config::{DatabaseConfig, IndexConfig, StoreConfig};
pub use connection::{Connection, ConnectionPlugin};
pub use error::{StorageError, StorageResult};
pub use index::{check_unique, IndexTable};
pub use key::Key;
pub use kv::{KeyValueStore, KvConnection, KvPlugin, MemoryKeyValueStore};
pub use memory::{MemoryConnection, MemoryPlugin};
pub use options::{CursorOptions, Direction, Operator, QueryResult, SearchOptions};
pub use types::{field_text, value_text, Resource};
pub use worker::{WorkerKeyValueStore, DEFAULT_WAIT};
