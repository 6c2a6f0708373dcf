//! Per-instance bookkeeping kept beside a record's fields.

use crate::schema::Relationship;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reserved payload key under which synchronization metadata is persisted.
pub const PARAMS_KEY: &str = "$recordb:params";

/// Synchronization metadata.
///
/// The engine never interprets these values; it writes them on save and
/// lifts them back out of the payload on hydrate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// When the record was last changed by the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Value>,
    /// When the record was last synchronized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<Value>,
    /// Errors from the last synchronization attempts.
    #[serde(default)]
    pub sync_errors: Vec<Value>,
}

impl SyncMeta {
    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_updated.is_none() && self.last_synced.is_none() && self.sync_errors.is_empty()
    }

    /// Reads metadata from a stored payload value.
    ///
    /// Malformed metadata is treated as absent.
    pub(crate) fn from_payload(value: Value) -> Option<Self> {
        match serde_json::from_value(value) {
            Ok(meta) => Some(meta),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed sync metadata");
                None
            }
        }
    }
}

/// The parameter bag of a model instance.
///
/// Never part of the record's fields.
#[derive(Debug, Clone, Default)]
pub struct ParamBag {
    pub(crate) is_new: bool,
    pub(crate) is_instance: bool,
    pub(crate) original: Option<String>,
    pub(crate) preload: BTreeMap<String, Relationship>,
    pub(crate) sync: SyncMeta,
}

impl ParamBag {
    /// Returns true if the record has no persisted key yet.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns true once the record has been hydrated or saved.
    #[must_use]
    pub const fn is_instance(&self) -> bool {
        self.is_instance
    }

    /// Returns the canonical snapshot taken at the last hydrate or save.
    #[must_use]
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Iterates the relationship names scheduled for loading.
    pub fn preloads(&self) -> impl Iterator<Item = &str> {
        self.preload.keys().map(String::as_str)
    }

    /// Returns the synchronization metadata.
    #[must_use]
    pub const fn sync(&self) -> &SyncMeta {
        &self.sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sync_meta_uses_camel_case() {
        let meta = SyncMeta {
            last_updated: Some(json!(10)),
            last_synced: None,
            sync_errors: vec![json!("timeout")],
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, json!({"lastUpdated": 10, "syncErrors": ["timeout"]}));

        let back = SyncMeta::from_payload(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn malformed_meta_is_absent() {
        assert!(SyncMeta::from_payload(json!("nope")).is_none());
        assert!(SyncMeta::from_payload(json!({})).unwrap().is_empty());
    }

    #[test]
    fn default_bag() {
        let bag = ParamBag::default();
        assert!(!bag.is_new());
        assert!(!bag.is_instance());
        assert!(bag.original().is_none());
        assert_eq!(bag.preloads().count(), 0);
        assert!(bag.sync().is_empty());
    }
}
