//! Key/value requests served by a dedicated worker thread.
//!
//! [`WorkerKeyValueStore`] hands every request to a worker that owns the
//! underlying store and waits a bounded time for the answer. A request that
//! is not answered in time fails with [`StorageError::Timeout`]; the worker
//! still finishes it later.

use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long a request waits for the worker by default.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

enum Request {
    Get {
        key: String,
        response: Sender<StorageResult<Option<String>>>,
    },
    Set {
        key: String,
        value: String,
        response: Sender<StorageResult<()>>,
    },
    Remove {
        key: String,
        response: Sender<StorageResult<bool>>,
    },
}

/// A [`KeyValueStore`] whose requests run on a worker thread.
///
/// # Example
///
/// ```rust
/// use recordb_storage::{KeyValueStore, MemoryKeyValueStore, WorkerKeyValueStore};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = WorkerKeyValueStore::spawn(
///     Arc::new(MemoryKeyValueStore::new()),
///     Duration::from_millis(500),
/// )
/// .unwrap();
/// store.set_item("a", "1".to_string()).unwrap();
/// assert_eq!(store.get_item("a").unwrap(), Some("1".to_string()));
/// ```
pub struct WorkerKeyValueStore {
    sender: Sender<Request>,
    wait: Duration,
}

impl WorkerKeyValueStore {
    /// Starts a worker serving `inner`.
    ///
    /// Each request waits at most `wait` for its answer. The worker exits
    /// when this store is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the thread cannot be spawned.
    pub fn spawn(inner: Arc<dyn KeyValueStore>, wait: Duration) -> StorageResult<Self> {
        let (sender, receiver) = mpsc::channel::<Request>();
        thread::Builder::new()
            .name("recordb-kv-worker".to_string())
            .spawn(move || {
                while let Ok(request) = receiver.recv() {
                    serve(inner.as_ref(), request);
                }
                tracing::debug!("key/value worker stopped");
            })
            .map_err(|err| StorageError::backend(format!("failed to spawn key/value worker: {err}")))?;
        Ok(Self { sender, wait })
    }

    /// Returns how long each request waits.
    #[must_use]
    pub fn wait(&self) -> Duration {
        self.wait
    }

    fn call<T>(
        &self,
        operation: &str,
        request: impl FnOnce(Sender<StorageResult<T>>) -> Request,
    ) -> StorageResult<T> {
        let (response, answer) = mpsc::channel();
        self.sender
            .send(request(response))
            .map_err(|_| StorageError::backend("key/value worker is gone"))?;

        match answer.recv_timeout(self.wait) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(operation, waited = ?self.wait, "key/value request timed out");
                Err(StorageError::timeout(operation, self.wait))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(StorageError::backend("key/value worker dropped the request"))
            }
        }
    }
}

// A caller that gave up has dropped its receiver; its answer is discarded.
fn serve(store: &dyn KeyValueStore, request: Request) {
    match request {
        Request::Get { key, response } => {
            let _ = response.send(store.get_item(&key));
        }
        Request::Set {
            key,
            value,
            response,
        } => {
            let _ = response.send(store.set_item(&key, value));
        }
        Request::Remove { key, response } => {
            let _ = response.send(store.remove_item(&key));
        }
    }
}

impl KeyValueStore for WorkerKeyValueStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.call("get_item", |response| Request::Get {
            key: key.to_string(),
            response,
        })
    }

    fn set_item(&self, key: &str, value: String) -> StorageResult<()> {
        self.call("set_item", |response| Request::Set {
            key: key.to_string(),
            value,
            response,
        })
    }

    fn remove_item(&self, key: &str) -> StorageResult<bool> {
        self.call("remove_item", |response| Request::Remove {
            key: key.to_string(),
            response,
        })
    }
}

impl std::fmt::Debug for WorkerKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerKeyValueStore")
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct SlowStore {
        inner: MemoryKeyValueStore,
        stalled: AtomicBool,
    }

    impl KeyValueStore for SlowStore {
        fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
            if self.stalled.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(400));
            }
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: String) -> StorageResult<()> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> StorageResult<bool> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn answers_within_the_wait() {
        let store =
            WorkerKeyValueStore::spawn(Arc::new(MemoryKeyValueStore::new()), DEFAULT_WAIT).unwrap();
        store.set_item("a", "1".to_string()).unwrap();
        assert_eq!(store.get_item("a").unwrap(), Some("1".to_string()));
        assert!(store.remove_item("a").unwrap());
        assert!(!store.remove_item("a").unwrap());
    }

    #[test]
    fn stalled_request_times_out() {
        let slow = Arc::new(SlowStore {
            inner: MemoryKeyValueStore::new(),
            stalled: AtomicBool::new(true),
        });
        let store = WorkerKeyValueStore::spawn(slow.clone(), Duration::from_millis(100)).unwrap();

        let err = store.get_item("a").unwrap_err();
        assert!(matches!(
            err,
            StorageError::Timeout { ref operation, waited } if operation == "get_item" && waited == Duration::from_millis(100)
        ));

        slow.stalled.store(false, Ordering::SeqCst);
        // Let the worker finish the stalled read.
        thread::sleep(Duration::from_millis(500));
        store.set_item("a", "1".to_string()).unwrap();
        assert_eq!(store.get_item("a").unwrap(), Some("1".to_string()));
    }
}
