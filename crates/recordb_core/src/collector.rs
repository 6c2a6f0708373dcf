//! Deferred query results.
//!
//! A [`Collector`] wraps a pending model query and offers bulk helpers over
//! its result. The query runs when a terminal method is called.
//!
//! ```rust
//! use recordb_core::{collect, Context, Schema};
//! use recordb_storage::{CursorOptions, DatabaseConfig, MemoryConnection, StoreConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let config = DatabaseConfig::new("app").store(StoreConfig::new("users"));
//! let users = Context::new(Arc::new(MemoryConnection::open(config))).model(Schema::new("users"));
//! for id in ["u1", "u2"] {
//!     users.new_instance().set_attribute("id", id).save().unwrap();
//! }
//!
//! assert_eq!(collect(|| users.all(None, CursorOptions::new())).count().unwrap(), 2);
//! assert!(collect(|| users.all(None, CursorOptions::new())).delete().unwrap());
//! assert_eq!(collect(|| users.all(None, CursorOptions::new())).count().unwrap(), 0);
//! ```

use crate::error::CoreResult;
use crate::model::Model;
use recordb_storage::Resource;

/// A pending list of models.
pub struct Collector<F> {
    pending: F,
}

/// Wraps `pending` in a [`Collector`].
pub fn collect<F>(pending: F) -> Collector<F>
where
    F: FnOnce() -> CoreResult<Vec<Model>>,
{
    Collector::new(pending)
}

impl<F> Collector<F>
where
    F: FnOnce() -> CoreResult<Vec<Model>>,
{
    /// Creates a collector over `pending`.
    pub fn new(pending: F) -> Self {
        Self { pending }
    }

    /// Runs the query and returns its models.
    pub fn items(self) -> CoreResult<Vec<Model>> {
        (self.pending)()
    }

    /// Runs the query and returns the plain field maps.
    pub fn items_as_resources(self) -> CoreResult<Vec<Resource>> {
        Ok(self.items()?.iter().map(Model::resource).collect())
    }

    /// Runs the query and returns the number of models.
    pub fn count(self) -> CoreResult<usize> {
        Ok(self.items()?.len())
    }

    /// Calls `callback` for each model in order.
    ///
    /// Stops at the first callback error and returns it.
    pub fn each<C>(self, mut callback: C) -> CoreResult<()>
    where
        C: FnMut(&Model) -> CoreResult<()>,
    {
        for model in self.items()? {
            callback(&model)?;
        }
        Ok(())
    }

    /// Deletes every model.
    ///
    /// Returns true only if every deletion removed a record. Every
    /// deletion is attempted; the first failure is returned after the rest
    /// have run.
    pub fn delete(self) -> CoreResult<bool> {
        let models = self.items()?;
        let mut removed_all = true;
        let mut first_error = None;
        for model in &models {
            match model.delete() {
                Ok(removed) => removed_all &= removed,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        tracing::debug!(count = models.len(), removed_all, "collector delete");
        match first_error {
            Some(err) => Err(err),
            None => Ok(removed_all),
        }
    }
}

impl<F> std::fmt::Debug for Collector<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector").finish_non_exhaustive()
    }
}
