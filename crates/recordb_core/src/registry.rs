//! Connection registry.
//!
//! The registry opens connections through named plugins, caches them by
//! database name and tracks a default connection. A process-wide instance
//! is available through [`Registry::global`]; tests usually build their own
//! with [`Registry::new`].
//!
//! ```rust
//! use recordb_core::{Registry, Schema};
//! use recordb_storage::{DatabaseConfig, StoreConfig};
//!
//! let registry = Registry::new();
//! let config = DatabaseConfig::new("app").store(StoreConfig::new("users"));
//! let first = registry.initialize(&config).unwrap();
//! let again = registry.initialize(&config).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first, &again));
//!
//! let users = registry.model(Schema::new("users")).unwrap();
//! assert_eq!(users.context().connection().name(), "app");
//! ```

use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, DB_INIT_ERROR};
use crate::model::Model;
use crate::schema::{Record, Schema};
use parking_lot::RwLock;
use recordb_storage::{Connection, ConnectionPlugin, DatabaseConfig, KvPlugin, MemoryPlugin};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Plugin used when a configuration names none.
pub const DEFAULT_PLUGIN: &str = MemoryPlugin::NAME;

/// Named connections, plugins and the default connection.
pub struct Registry {
    plugins: RwLock<HashMap<String, Arc<dyn ConnectionPlugin>>>,
    connections: RwLock<HashMap<String, Arc<dyn Connection>>>,
    default: RwLock<Option<Arc<dyn Connection>>>,
    events: Arc<EventBus>,
}

impl Registry {
    /// Creates a registry with the bundled `memory` and `kv` plugins.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self {
            plugins: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            default: RwLock::new(None),
            events: Arc::new(EventBus::new()),
        };
        registry.register_plugin(Arc::new(MemoryPlugin));
        registry.register_plugin(Arc::new(KvPlugin::in_memory()));
        registry
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Returns the event bus shared by every context of this registry.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Registers `plugin` under its name, replacing any previous one.
    pub fn register_plugin(&self, plugin: Arc<dyn ConnectionPlugin>) {
        let name = plugin.name().to_string();
        tracing::debug!(plugin = %name, "registering connection plugin");
        self.plugins.write().insert(name, plugin);
    }

    /// Returns true if a plugin is registered under `name`.
    #[must_use]
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.read().contains_key(name)
    }

    /// Opens the connection described by `config`, or returns the cached
    /// connection of the same name.
    ///
    /// A newly opened connection becomes the default unless the
    /// configuration opts out.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin is unknown or setup fails. The error
    /// is published on [`DB_INIT_ERROR`] first.
    pub fn initialize(&self, config: &DatabaseConfig) -> CoreResult<Arc<dyn Connection>> {
        if let Some(existing) = self.get(&config.name) {
            tracing::debug!(name = %config.name, "reusing cached connection");
            return Ok(existing);
        }

        let connection = match self.open(config) {
            Ok(connection) => connection,
            Err(err) => {
                tracing::warn!(name = %config.name, error = %err, "connection setup failed");
                self.events.dispatch(DB_INIT_ERROR, &err);
                return Err(err);
            }
        };

        let connection = Arc::clone(
            self.connections
                .write()
                .entry(config.name.clone())
                .or_insert(connection),
        );

        if config.default {
            tracing::info!(name = %config.name, "default connection set");
            *self.default.write() = Some(Arc::clone(&connection));
        }

        Ok(connection)
    }

    fn open(&self, config: &DatabaseConfig) -> CoreResult<Arc<dyn Connection>> {
        let name = config.plugin.as_deref().unwrap_or(DEFAULT_PLUGIN);
        let plugin = self
            .plugins
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::plugin_not_found(name))?;

        tracing::debug!(name = %config.name, plugin = %name, "opening connection");
        Ok(plugin.setup(config)?)
    }

    /// Returns the cached connection named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Connection>> {
        self.connections.read().get(name).cloned()
    }

    /// Returns the default connection.
    #[must_use]
    pub fn default_connection(&self) -> Option<Arc<dyn Connection>> {
        self.default.read().clone()
    }

    /// Makes the cached connection `name` the default.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConnectionNotFound`] if nothing is cached
    /// under `name`.
    pub fn set_default(&self, name: &str) -> CoreResult<()> {
        let connection = self
            .get(name)
            .ok_or_else(|| CoreError::connection_not_found(name))?;
        tracing::info!(name, "default connection set");
        *self.default.write() = Some(connection);
        Ok(())
    }

    /// Builds a context over the default connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoDefaultConnection`] before any default has
    /// been initialized.
    pub fn context(&self) -> CoreResult<Context> {
        let connection = self
            .default_connection()
            .ok_or(CoreError::NoDefaultConnection)?;
        Ok(Context::new(connection).with_events(Arc::clone(&self.events)))
    }

    /// Builds a context over the cached connection `name`.
    pub fn context_for(&self, name: &str) -> CoreResult<Context> {
        let connection = self
            .get(name)
            .ok_or_else(|| CoreError::connection_not_found(name))?;
        Ok(Context::new(connection).with_events(Arc::clone(&self.events)))
    }

    /// Creates a bare model for `schema` on the default connection.
    pub fn model(&self, schema: Schema) -> CoreResult<Model> {
        Ok(self.context()?.model(schema))
    }

    /// Creates a bare model for a [`Record`] type on the default connection.
    pub fn record<R: Record>(&self) -> CoreResult<Model> {
        Ok(self.context()?.record::<R>())
    }

    /// Forgets every cached connection and the default.
    ///
    /// Plugins and event subscriptions are kept.
    pub fn clear(&self) {
        self.connections.write().clear();
        *self.default.write() = None;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut plugins: Vec<String> = self.plugins.read().keys().cloned().collect();
        plugins.sort_unstable();
        let mut connections: Vec<String> = self.connections.read().keys().cloned().collect();
        connections.sort_unstable();
        f.debug_struct("Registry")
            .field("plugins", &plugins)
            .field("connections", &connections)
            .field(
                "default",
                &self.default.read().as_ref().map(|c| c.name().to_string()),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use recordb_storage::{StorageError, StorageResult, StoreConfig};

    struct FailingPlugin;

    impl ConnectionPlugin for FailingPlugin {
        fn name(&self) -> &str {
            "failing"
        }

        fn setup(&self, _config: &DatabaseConfig) -> StorageResult<Arc<dyn Connection>> {
            Err(StorageError::backend("disk on fire"))
        }
    }

    fn config(name: &str) -> DatabaseConfig {
        DatabaseConfig::new(name).store(StoreConfig::new("users"))
    }

    #[test]
    fn bundled_plugins_registered() {
        let registry = Registry::new();
        assert!(registry.has_plugin("memory"));
        assert!(registry.has_plugin("kv"));
        assert!(!registry.has_plugin("failing"));
    }

    #[test]
    fn initialize_caches_by_name() {
        let registry = Registry::new();
        let first = registry.initialize(&config("app")).unwrap();
        let second = registry.initialize(&config("app").plugin("kv")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn first_initialized_becomes_default() {
        let registry = Registry::new();
        assert!(registry.default_connection().is_none());
        assert!(matches!(
            registry.context(),
            Err(CoreError::NoDefaultConnection)
        ));

        registry.initialize(&config("one")).unwrap();
        registry.initialize(&config("two")).unwrap();
        assert_eq!(registry.default_connection().unwrap().name(), "two");

        registry.set_default("one").unwrap();
        assert_eq!(registry.context().unwrap().connection().name(), "one");
        assert!(registry.set_default("missing").is_err());
    }

    #[test]
    fn opting_out_keeps_previous_default() {
        let registry = Registry::new();
        registry.initialize(&config("main")).unwrap();
        registry
            .initialize(&config("side").default_connection(false))
            .unwrap();
        assert_eq!(registry.default_connection().unwrap().name(), "main");
        assert!(registry.get("side").is_some());
    }

    #[test]
    fn setup_failure_is_published() {
        let registry = Registry::new();
        registry.register_plugin(Arc::new(FailingPlugin));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry
            .events()
            .on_database_init_error(move |err| sink.lock().push(err.to_string()));

        let err = registry
            .initialize(&config("broken").plugin("failing"))
            .err().unwrap();
        assert!(err.is_storage());
        assert!(registry.get("broken").is_none());

        let err = registry
            .initialize(&config("nowhere").plugin("carrier-pigeon"))
            .err().unwrap();
        assert!(matches!(err, CoreError::PluginNotFound { .. }));
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn clear_forgets_connections() {
        let registry = Registry::new();
        registry.initialize(&config("app")).unwrap();
        registry.clear();
        assert!(registry.get("app").is_none());
        assert!(registry.default_connection().is_none());
        assert!(registry.has_plugin("memory"));
    }

    #[test]
    fn contexts_share_registry_events() {
        let registry = Registry::new();
        registry.initialize(&config("app")).unwrap();
        let context = registry.context_for("app").unwrap();
        assert!(Arc::ptr_eq(context.events(), registry.events()));
    }
}
