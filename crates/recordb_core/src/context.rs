//! Connection context carried by every model.

use crate::events::EventBus;
use crate::model::Model;
use crate::schema::{Record, Schema};
use recordb_storage::Connection;
use std::sync::Arc;

/// Default page size for `many` and `all`.
pub const DEFAULT_PER_PAGE: usize = 15;

/// What a model needs to reach storage.
///
/// Cloning is cheap; clones share the connection and the event bus.
///
/// # Example
///
/// ```rust
/// use recordb_core::{Context, DEFAULT_PER_PAGE};
/// use recordb_storage::{DatabaseConfig, MemoryConnection, StoreConfig};
/// use std::sync::Arc;
///
/// let config = DatabaseConfig::new("app").store(StoreConfig::new("users"));
/// let context = Context::new(Arc::new(MemoryConnection::open(config)));
/// assert_eq!(context.page_size(), DEFAULT_PER_PAGE);
///
/// let paged = context.per_page(50);
/// assert_eq!(paged.page_size(), 50);
/// ```
#[derive(Clone)]
pub struct Context {
    connection: Arc<dyn Connection>,
    events: Arc<EventBus>,
    per_page: usize,
}

impl Context {
    /// Creates a context with a private event bus.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            events: Arc::new(EventBus::new()),
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Publishes failures on `events` instead of a private bus.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Sets the page size used when a query has no limit.
    #[must_use]
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    /// Returns the connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Returns the page size.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.per_page
    }

    /// Creates a bare model for `schema`.
    #[must_use]
    pub fn model(&self, schema: Schema) -> Model {
        Model::new(schema, self.clone())
    }

    /// Creates a bare model for a [`Record`] type.
    #[must_use]
    pub fn record<R: Record>(&self) -> Model {
        self.model(R::schema())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("connection", &self.connection.name())
            .field("per_page", &self.per_page)
            .finish_non_exhaustive()
    }
}
