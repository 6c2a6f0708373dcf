//! Active-record model.
//!
//! A [`Model`] is one record of a [`Schema`]: its field map, the resolved
//! relationships and a [`ParamBag`] tracking lifecycle state. A bare model
//! acts as the entry point for queries on its store; every record returned
//! by a query is a fresh model that inherits the caller's preloads.
//!
//! # Lifecycle
//!
//! ```text
//! bare ──hydrate──▶ instance (clean) ──mutate──▶ dirty ──save──▶ clean
//!                        │                                       │
//!                        └──────────────── delete ◀──────────────┘
//! ```
//!
//! # Errors
//!
//! Every verb that touches storage publishes its failure on
//! [`MODEL_OP_ERROR`] before returning it. Misuse errors such as
//! [`CoreError::MissingKey`] are returned without being published.

use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::events::MODEL_OP_ERROR;
use crate::params::{ParamBag, SyncMeta, PARAMS_KEY};
use crate::schema::{Cardinality, Schema};
use recordb_storage::{
    Connection, CursorOptions, Key, Operator, Resource, SearchOptions, StorageResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of keys produced by [`Model::generate_key`].
///
/// A record whose key starts with it is still considered new.
pub const GENERATED_KEY_PREFIX: &str = "generated";

/// A resolved relationship.
#[derive(Debug, Clone)]
pub enum Related {
    /// Result of a `belongs` or `one` relationship.
    One(Option<Box<Model>>),
    /// Result of a `many` relationship.
    Many(Vec<Model>),
}

impl Related {
    /// Returns the single related model, if any.
    #[must_use]
    pub fn as_one(&self) -> Option<&Model> {
        match self {
            Self::One(model) => model.as_deref(),
            Self::Many(_) => None,
        }
    }

    /// Returns the related models of a `many` relationship.
    #[must_use]
    pub fn as_many(&self) -> &[Model] {
        match self {
            Self::One(_) => &[],
            Self::Many(models) => models,
        }
    }

    /// Returns the number of related models.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(model) => usize::from(model.is_some()),
            Self::Many(models) => models.len(),
        }
    }

    /// Returns true if nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One record bound to a [`Context`].
///
/// # Example
///
/// ```rust
/// use recordb_core::{Context, Schema};
/// use recordb_storage::{DatabaseConfig, MemoryConnection, StoreConfig};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let config = DatabaseConfig::new("app").store(StoreConfig::new("users").indexed(["name"]));
/// let context = Context::new(Arc::new(MemoryConnection::open(config)));
/// let users = context.model(Schema::new("users"));
///
/// let mut alice = users.new_instance();
/// alice.set_attribute("id", "u1").set_attribute("name", "Alice");
/// alice.save().unwrap();
///
/// let found = users.find("name", "alice").unwrap().unwrap();
/// assert_eq!(found.key(), Some(&json!("u1")));
/// assert!(found.is_clean());
/// ```
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<Schema>,
    context: Context,
    fields: Resource,
    relations: BTreeMap<String, Related>,
    params: ParamBag,
}

impl Model {
    /// Creates a bare model.
    pub fn new(schema: impl Into<Arc<Schema>>, context: Context) -> Self {
        Self {
            schema: schema.into(),
            context,
            fields: Resource::new(),
            relations: BTreeMap::new(),
            params: ParamBag::default(),
        }
    }

    /// Creates a bare model of the same schema and context.
    #[must_use]
    pub fn new_instance(&self) -> Self {
        Self::new(Arc::clone(&self.schema), self.context.clone())
    }

    /// A bare model carrying this model's preloads.
    fn spawn(&self) -> Self {
        let mut model = self.new_instance();
        model.params.preload = self.params.preload.clone();
        model
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the parameter bag.
    #[must_use]
    pub fn params(&self) -> &ParamBag {
        &self.params
    }

    /// Returns the synchronization metadata for editing.
    ///
    /// The metadata is persisted on the next [`Model::save`]. Editing it
    /// does not make the record dirty.
    pub fn sync_meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.params.sync
    }

    /// Returns the raw key value. Null counts as absent.
    #[must_use]
    pub fn key(&self) -> Option<&Value> {
        self.fields
            .get(self.schema.key_field())
            .filter(|value| !value.is_null())
    }

    /// Returns the normalized key.
    #[must_use]
    pub fn parsed_key(&self) -> Key {
        Key::parse(self.key())
    }

    /// Returns true if the record has no persisted key yet.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.params.is_new
    }

    /// Returns true once the record has been hydrated or saved.
    #[must_use]
    pub const fn is_instance(&self) -> bool {
        self.params.is_instance
    }

    /// Returns a field value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Removes a field, returning its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Returns the field map.
    #[must_use]
    pub fn attributes(&self) -> &Resource {
        &self.fields
    }

    /// Returns a copy of the field map without relations or bookkeeping.
    #[must_use]
    pub fn resource(&self) -> Resource {
        self.fields.clone()
    }

    /// Deserializes the field map into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if the fields do not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> CoreResult<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    /// Returns a resolved relationship.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    /// Iterates resolved relationships in name order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Related)> {
        self.relations.iter().map(|(name, rel)| (name.as_str(), rel))
    }

    /// Canonical serialization of the field map.
    #[must_use]
    pub fn canonical(&self) -> String {
        // A map of JSON values always serializes.
        serde_json::to_string(&self.fields).unwrap_or_default()
    }

    /// Returns true if the fields differ from the last snapshot.
    ///
    /// A model that was never hydrated or saved is dirty.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        match &self.params.original {
            Some(original) => *original != self.canonical(),
            None => true,
        }
    }

    /// Returns true if the fields match the last snapshot.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.is_dirty()
    }

    /// Copies `data` into the fields and takes a snapshot.
    ///
    /// Fields outside the schema projection are dropped. Synchronization
    /// metadata found under the reserved payload key is moved into the
    /// parameter bag when the model has none yet. Preloads are kept.
    pub fn hydrate(&mut self, mut data: Resource) -> &mut Self {
        if let Some(meta) = data.remove(PARAMS_KEY) {
            if self.params.sync.is_empty() {
                if let Some(sync) = SyncMeta::from_payload(meta) {
                    self.params.sync = sync;
                }
            }
        }

        for (field, value) in data {
            if self.schema.allows(&field) {
                self.fields.insert(field, value);
            }
        }

        self.snapshot();
        self
    }

    /// Hydrates from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not serialize to a JSON object.
    pub fn hydrate_from<T: Serialize>(&mut self, value: &T) -> CoreResult<&mut Self> {
        match serde_json::to_value(value)? {
            Value::Object(data) => Ok(self.hydrate(data)),
            other => Err(CoreError::invalid_record(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    fn snapshot(&mut self) {
        let key = self.parsed_key();
        self.params.is_new = key.is_empty() || key.as_text().starts_with(GENERATED_KEY_PREFIX);
        self.params.is_instance = true;
        self.params.original = Some(self.canonical());
    }

    /// Produces a fresh generated key.
    ///
    /// The key is written into the key field only when the model is an
    /// instance.
    pub fn generate_key(&mut self) -> String {
        let key = format!("{GENERATED_KEY_PREFIX}_{}", Uuid::new_v4().simple());
        if self.params.is_instance {
            self.fields.insert(
                self.schema.key_field().to_string(),
                Value::String(key.clone()),
            );
        }
        key
    }

    /// Schedules relationship `name` to be resolved by the next query.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RelationshipNotFound`] if the schema does not
    /// declare `name`.
    pub fn with(mut self, name: &str) -> CoreResult<Self> {
        let relationship = self
            .schema
            .relationship(name)
            .cloned()
            .ok_or_else(|| CoreError::relationship_not_found(self.schema.store_name(), name))?;
        self.params.preload.insert(name.to_string(), relationship);
        Ok(self)
    }

    /// Resolves the scheduled relationships of this model.
    pub fn load(&mut self) -> CoreResult<&mut Self> {
        self.load_relationships()?;
        Ok(self)
    }

    /// Fetches the record stored under `key`.
    pub fn get(&self, key: impl Into<Key>) -> CoreResult<Option<Self>> {
        let key = key.into();
        tracing::debug!(store = self.schema.store_name(), key = %key, "get");
        let found = self.guard("get", |conn, store| conn.get(store, &key))?;
        found.map(|data| self.resolve(data)).transpose()
    }

    /// Writes the record, generating a key first when it has none.
    pub fn save(&mut self) -> CoreResult<&mut Self> {
        self.params.is_instance = true;
        if self.parsed_key().is_empty() {
            self.generate_key();
        }

        let key = self.parsed_key();
        let mut payload: Resource = self
            .fields
            .iter()
            .filter(|(field, _)| field.as_str() != PARAMS_KEY && self.schema.allows(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        payload.insert(PARAMS_KEY.to_string(), serde_json::to_value(&self.params.sync)?);

        tracing::debug!(store = self.schema.store_name(), key = %key, "save");
        self.guard("save", |conn, store| conn.set(store, &key, payload))?;
        self.snapshot();
        Ok(self)
    }

    /// Deletes the record by its key.
    ///
    /// Returns true if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingKey`] if the record has no key.
    pub fn delete(&self) -> CoreResult<bool> {
        let key = self.parsed_key();
        if key.is_empty() {
            return Err(CoreError::missing_key(self.schema.store_name()));
        }
        tracing::debug!(store = self.schema.store_name(), key = %key, "delete");
        self.guard("delete", |conn, store| conn.delete(store, &key))
    }

    /// Returns the first record whose `field` index equals `search`.
    pub fn find(&self, field: &str, search: impl Into<Value>) -> CoreResult<Option<Self>> {
        let search = search.into();
        let options = SearchOptions::new().operator(Operator::Equals);
        let result = self.guard("find", |conn, store| {
            conn.query(store, field, &search, &options)
        })?;
        result
            .into_single()
            .map(|data| self.resolve(data))
            .transpose()
    }

    /// Returns the records whose `field` index matches `search`.
    ///
    /// Without an explicit operator the match is `includes`; without a
    /// limit, one page of [`Context::page_size`] records is returned.
    /// An explicit `limit(0)` lifts the cap and returns every match.
    pub fn many(
        &self,
        field: &str,
        search: impl Into<Value>,
        mut options: SearchOptions,
    ) -> CoreResult<Vec<Self>> {
        options.operator.get_or_insert(Operator::Includes);
        options.limit.get_or_insert(self.context.page_size());
        self.query_many(field, &search.into(), &options)
    }

    /// Scans the store in key order, or in `index` order when given.
    ///
    /// Without a limit, one page of [`Context::page_size`] records is
    /// returned. An explicit `limit(0)` lifts the cap and returns every
    /// record.
    pub fn all(&self, index: Option<&str>, mut options: CursorOptions) -> CoreResult<Vec<Self>> {
        options.limit.get_or_insert(self.context.page_size());
        let records = self.guard("all", |conn, store| conn.all(store, index, &options))?;
        records.into_iter().map(|data| self.resolve(data)).collect()
    }

    fn query_many(&self, field: &str, search: &Value, options: &SearchOptions) -> CoreResult<Vec<Self>> {
        let records = self
            .guard("many", |conn, store| conn.query(store, field, search, options))?
            .into_many();
        records.into_iter().map(|data| self.resolve(data)).collect()
    }

    fn resolve(&self, data: Resource) -> CoreResult<Self> {
        let mut model = self.spawn();
        model.hydrate(data);
        model.load_relationships()?;
        Ok(model)
    }

    fn load_relationships(&mut self) -> CoreResult<()> {
        if self.params.preload.is_empty() {
            return Ok(());
        }

        let preload = self.params.preload.clone();
        for (name, relationship) in preload {
            let related = self.context.model(relationship.related());
            let foreign_key = relationship.foreign_key();

            let loaded = match relationship.cardinality() {
                Cardinality::Belongs => {
                    let target = Key::parse(self.fields.get(foreign_key));
                    if target.is_empty() {
                        continue;
                    }
                    Related::One(related.get(target)?.map(Box::new))
                }
                Cardinality::One => {
                    let found = related.find(foreign_key, self.parsed_key().to_value())?;
                    Related::One(found.map(Box::new))
                }
                Cardinality::Many => {
                    let options = SearchOptions::new().operator(Operator::EqualsMany);
                    Related::Many(related.query_many(
                        foreign_key,
                        &self.parsed_key().to_value(),
                        &options,
                    )?)
                }
            };

            tracing::debug!(
                store = self.schema.store_name(),
                relationship = %name,
                found = loaded.len(),
                "resolved relationship"
            );
            self.relations.insert(name, loaded);
        }

        Ok(())
    }

    /// Runs a storage call, publishing its failure on the event bus.
    fn guard<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn Connection, &str) -> StorageResult<T>,
    ) -> CoreResult<T> {
        let store = self.schema.store_name();
        call(self.context.connection().as_ref(), store).map_err(|err| {
            let err = CoreError::from(err);
            tracing::warn!(store, operation, error = %err, "model operation failed");
            self.context.events().dispatch(MODEL_OP_ERROR, &err);
            err
        })
    }
}
