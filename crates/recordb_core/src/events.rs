//! In-process event bus.
//!
//! The bus surfaces failures without forcing every caller to handle them:
//! the registry publishes setup failures on [`DB_INIT_ERROR`] and every
//! storage-touching model verb publishes its failure on [`MODEL_OP_ERROR`]
//! before returning it.
//!
//! # Usage
//!
//! ```rust
//! use recordb_core::{EventBus, MODEL_OP_ERROR};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let id = bus.subscribe(MODEL_OP_ERROR, move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.dispatch(MODEL_OP_ERROR, &"boom");
//! assert!(bus.unsubscribe(id));
//! bus.dispatch(MODEL_OP_ERROR, &"ignored");
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use crate::error::CoreError;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Topic for connection setup failures.
pub const DB_INIT_ERROR: &str = "database_initialization_error";

/// Topic for failed model operations.
pub const MODEL_OP_ERROR: &str = "model_operation_error";

/// A subscriber callback. It receives the dispatched context value.
pub type Listener = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Named-topic publish/subscribe.
///
/// Delivery is synchronous and follows subscription order. Listeners run
/// outside the internal lock, so a listener may subscribe or unsubscribe.
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<(SubscriptionId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribes `listener` to `topic`.
    pub fn subscribe<F>(&self, topic: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&dyn Any) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(topic.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Subscribes to connection setup failures.
    pub fn on_database_init_error<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CoreError) + Send + Sync + 'static,
    {
        self.subscribe(DB_INIT_ERROR, move |context| {
            if let Some(err) = context.downcast_ref::<CoreError>() {
                listener(err);
            }
        })
    }

    /// Subscribes to failed model operations.
    pub fn on_model_operation_error<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CoreError) + Send + Sync + 'static,
    {
        self.subscribe(MODEL_OP_ERROR, move |context| {
            if let Some(err) = context.downcast_ref::<CoreError>() {
                listener(err);
            }
        })
    }

    /// Removes one subscription.
    ///
    /// Returns true if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        for subscribers in listeners.values_mut() {
            if let Some(position) = subscribers.iter().position(|(existing, _)| *existing == id) {
                subscribers.remove(position);
                return true;
            }
        }
        false
    }

    /// Delivers `context` to every subscriber of `topic`.
    ///
    /// A topic without subscribers is a no-op.
    pub fn dispatch(&self, topic: &str, context: &dyn Any) {
        let subscribers: Vec<Listener> = match self.listeners.read().get(topic) {
            Some(subscribers) => subscribers
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect(),
            None => return,
        };

        for listener in subscribers {
            listener(context);
        }
    }

    /// Removes every subscription for `topic`.
    pub fn clear(&self, topic: &str) {
        self.listeners.write().remove(topic);
    }

    /// Removes every subscription.
    pub fn clear_all(&self) {
        self.listeners.write().clear();
    }

    /// Returns the number of subscribers for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.listeners.read().get(topic).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        let mut topics: Vec<(&str, usize)> = listeners
            .iter()
            .map(|(topic, subscribers)| (topic.as_str(), subscribers.len()))
            .collect();
        topics.sort_unstable();
        f.debug_struct("EventBus").field("topics", &topics).finish()
    }
}
