//! Record type descriptors.
//!
//! A [`Schema`] tells a [`crate::Model`] where its records live, which
//! field holds the key, which fields are persisted and how the record
//! relates to other record types. Schemas are usually produced by a
//! [`Record`] implementation:
//!
//! ```rust
//! use recordb_core::{Record, Relationship};
//!
//! struct User;
//! struct Post;
//!
//! impl Record for User {
//!     fn store_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn relationships() -> Vec<(&'static str, Relationship)> {
//!         vec![("posts", Relationship::many(Post::schema, "user_id"))]
//!     }
//! }
//!
//! impl Record for Post {
//!     fn store_name() -> &'static str {
//!         "posts"
//!     }
//!
//!     fn relationships() -> Vec<(&'static str, Relationship)> {
//!         vec![("user", Relationship::belongs(User::schema, "user_id"))]
//!     }
//! }
//!
//! let schema = User::schema();
//! assert_eq!(schema.store_name(), "users");
//! assert_eq!(schema.key_field(), "id");
//! assert_eq!(schema.relationship("posts").unwrap().related().store_name(), "posts");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Produces the schema of a related record type on demand.
///
/// A plain function pointer keeps mutually referencing record types
/// resolvable without building an infinite descriptor graph.
pub type SchemaFactory = fn() -> Schema;

/// Default key field name.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// How a related record is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// This record holds the foreign key; load one record by primary key.
    Belongs,
    /// First related record whose foreign key equals this record's key.
    One,
    /// All related records whose foreign key equals this record's key.
    Many,
}

/// A relationship declaration.
#[derive(Debug, Clone)]
pub struct Relationship {
    related: SchemaFactory,
    cardinality: Cardinality,
    foreign_key: String,
}

impl Relationship {
    /// Creates a relationship.
    pub fn new(related: SchemaFactory, cardinality: Cardinality, foreign_key: impl Into<String>) -> Self {
        Self {
            related,
            cardinality,
            foreign_key: foreign_key.into(),
        }
    }

    /// This record holds `foreign_key` pointing at the related record.
    pub fn belongs(related: SchemaFactory, foreign_key: impl Into<String>) -> Self {
        Self::new(related, Cardinality::Belongs, foreign_key)
    }

    /// One related record holds `foreign_key` pointing at this record.
    pub fn one(related: SchemaFactory, foreign_key: impl Into<String>) -> Self {
        Self::new(related, Cardinality::One, foreign_key)
    }

    /// Many related records hold `foreign_key` pointing at this record.
    pub fn many(related: SchemaFactory, foreign_key: impl Into<String>) -> Self {
        Self::new(related, Cardinality::Many, foreign_key)
    }

    /// Builds the related schema.
    #[must_use]
    pub fn related(&self) -> Schema {
        (self.related)()
    }

    /// Returns the cardinality.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns the foreign key field.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }
}

/// Descriptor of one record type.
#[derive(Debug, Clone)]
pub struct Schema {
    store_name: String,
    key_field: String,
    fields: Option<Vec<String>>,
    relationships: BTreeMap<String, Relationship>,
}

impl Schema {
    /// Creates a schema for `store_name` with key field `id`, no
    /// projection and no relationships.
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            fields: None,
            relationships: BTreeMap::new(),
        }
    }

    /// Sets the key field.
    #[must_use]
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// Restricts hydration and persistence to `fields`.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Declares a relationship.
    #[must_use]
    pub fn with_relationship(mut self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.relationships.insert(name.into(), relationship);
        self
    }

    /// Declares a `belongs` relationship.
    #[must_use]
    pub fn belongs_to(self, name: impl Into<String>, related: SchemaFactory, foreign_key: impl Into<String>) -> Self {
        self.with_relationship(name, Relationship::belongs(related, foreign_key))
    }

    /// Declares a `one` relationship.
    #[must_use]
    pub fn has_one(self, name: impl Into<String>, related: SchemaFactory, foreign_key: impl Into<String>) -> Self {
        self.with_relationship(name, Relationship::one(related, foreign_key))
    }

    /// Declares a `many` relationship.
    #[must_use]
    pub fn has_many(self, name: impl Into<String>, related: SchemaFactory, foreign_key: impl Into<String>) -> Self {
        self.with_relationship(name, Relationship::many(related, foreign_key))
    }

    /// Returns the store name.
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Returns the key field.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Returns the declared projection, if any.
    #[must_use]
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// Returns true if `field` is kept by the projection.
    #[must_use]
    pub fn allows(&self, field: &str) -> bool {
        self.fields
            .as_ref()
            .map_or(true, |fields| fields.iter().any(|f| f == field))
    }

    /// Returns a relationship by name.
    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    /// Iterates relationships in name order.
    pub fn relationships(&self) -> impl Iterator<Item = (&str, &Relationship)> {
        self.relationships.iter().map(|(name, rel)| (name.as_str(), rel))
    }
}

/// Static description of a record type.
///
/// Only [`Record::store_name`] is required. The remaining items default to
/// key field `id`, no projection and no relationships.
pub trait Record {
    /// Store holding records of this type.
    fn store_name() -> &'static str;

    /// Field holding the key.
    fn key_field() -> &'static str {
        DEFAULT_KEY_FIELD
    }

    /// Ordered projection of persisted fields.
    fn fields() -> Option<&'static [&'static str]> {
        None
    }

    /// Relationship declarations by name.
    fn relationships() -> Vec<(&'static str, Relationship)> {
        Vec::new()
    }

    /// Builds the schema from the items above.
    fn schema() -> Schema {
        let mut schema = Schema::new(Self::store_name()).with_key_field(Self::key_field());
        if let Some(fields) = Self::fields() {
            schema = schema.with_fields(fields.iter().copied());
        }
        for (name, relationship) in Self::relationships() {
            schema = schema.with_relationship(name, relationship);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slug;

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

    fn comments() -> Schema {
        Schema::new("comments").belongs_to("author", authors, "author_id")
    }

    fn authors() -> Schema {
        Schema::new("authors").has_many("comments", comments, "author_id")
    }

    #[test]
    fn record_defaults() {
        struct Bare;
        impl Record for Bare {
            fn store_name() -> &'static str {
                "bare"
            }
        }

        let schema = Bare::schema();
        assert_eq!(schema.store_name(), "bare");
        assert_eq!(schema.key_field(), "id");
        assert!(schema.fields().is_none());
        assert!(schema.allows("anything"));
        assert_eq!(schema.relationships().count(), 0);
    }

    #[test]
    fn record_overrides() {
        let schema = Slug::schema();
        assert_eq!(schema.key_field(), "slug");
        assert_eq!(schema.fields().unwrap(), ["slug", "title"]);
        assert!(schema.allows("title"));
        assert!(!schema.allows("body"));
    }

    #[test]
    fn mutual_relationships_resolve_lazily() {
        let author = authors();
        let rel = author.relationship("comments").unwrap();
        assert_eq!(rel.cardinality(), Cardinality::Many);
        assert_eq!(rel.foreign_key(), "author_id");

        let comment = rel.related();
        let back = comment.relationship("author").unwrap();
        assert_eq!(back.cardinality(), Cardinality::Belongs);
        assert_eq!(back.related().store_name(), "authors");
    }

    #[test]
    fn unknown_relationship_is_none() {
        assert!(authors().relationship("likes").is_none());
    }
}
