//! Connection configuration.

use serde::{Deserialize, Serialize};

/// A secondary index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name, used by queries.
    pub name: String,
    /// Field path the index extracts. Defaults to the index name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Whether two keys may share an index value.
    #[serde(default)]
    pub unique: bool,
}

impl IndexConfig {
    /// Creates a non-unique index on the field of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            unique: false,
        }
    }

    /// Sets the extracted field path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Returns the field path the index reads.
    #[must_use]
    pub fn key_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

/// A store declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store name.
    pub name: String,
    /// Secondary indexes maintained on every write.
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

impl StoreConfig {
    /// Creates a store with no indexes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexConfig) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds plain indexes named after their fields.
    #[must_use]
    pub fn indexed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes
            .extend(names.into_iter().map(|name| IndexConfig::new(name)));
        self
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn find_index(&self, name: &str) -> Option<&IndexConfig> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

/// Configuration for one logical database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection name; the registry caches one connection per name.
    pub name: String,
    /// Schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Name of the backend plugin. The registry default is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    /// Whether the connection becomes the registry default.
    #[serde(default = "default_true")]
    pub default: bool,
    /// Declared stores.
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
}

fn default_true() -> bool {
    true
}

impl DatabaseConfig {
    /// Creates a configuration with no stores.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            plugin: None,
            default: true,
            stores: Vec::new(),
        }
    }

    /// Sets the schema version.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Selects the backend plugin by name.
    #[must_use]
    pub fn plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Sets whether the connection becomes the registry default.
    #[must_use]
    pub fn default_connection(mut self, value: bool) -> Self {
        self.default = value;
        self
    }

    /// Adds a store.
    #[must_use]
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.stores.push(store);
        self
    }

    /// Looks up a store by name.
    #[must_use]
    pub fn find_store(&self, name: &str) -> Option<&StoreConfig> {
        self.stores.iter().find(|store| store.name == name)
    }

    /// Returns the version, treating an unset version as 1.
    #[must_use]
    pub fn version_or_default(&self) -> u32 {
        self.version.unwrap_or(1)
    }
}
