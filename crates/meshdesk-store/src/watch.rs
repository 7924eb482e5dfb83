//! `WatchableStore` trait, store paths and subscription handles.
//! The trait is the only way projections reach the store, so tests and the
//! CLI can swap in any implementation.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StoreError;

/// Callback invoked for each observed write: `(id, Some(value))` for a put,
/// `(id, None)` for a tombstone.
pub type StoreCallback = Arc<dyn Fn(&str, Option<&Value>) + Send + Sync>;

/// Detach action carried by a [`SubscriptionHandle`].
pub type DetachFn = Box<dyn FnOnce() -> Result<(), StoreError> + Send + Sync>;

/// Capability surface of the external store.
///
/// Delivery is at-least-once per written value to every active subscriber,
/// ordered per id but not across ids.
pub trait WatchableStore: Send + Sync {
    /// Register `callback` for every record of `collection`, current and
    /// future. Returns the handle that detaches the listener.
    fn subscribe_all(
        &self,
        collection: &str,
        callback: StoreCallback,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Write `value` at `path`; `None` writes a tombstone.
    fn put(&self, path: &StorePath, value: Option<Value>) -> Result<(), StoreError>;

    /// Read the current value at `path` once.
    fn get_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;
}

impl<T: WatchableStore + ?Sized> WatchableStore for &T {
    fn subscribe_all(
        &self,
        collection: &str,
        callback: StoreCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        (**self).subscribe_all(collection, callback)
    }

    fn put(&self, path: &StorePath, value: Option<Value>) -> Result<(), StoreError> {
        (**self).put(path, value)
    }

    fn get_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        (**self).get_once(path)
    }
}

impl<T: WatchableStore + ?Sized> WatchableStore for Arc<T> {
    fn subscribe_all(
        &self,
        collection: &str,
        callback: StoreCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        (**self).subscribe_all(collection, callback)
    }

    fn put(&self, path: &StorePath, value: Option<Value>) -> Result<(), StoreError> {
        (**self).put(path, value)
    }

    fn get_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        (**self).get_once(path)
    }
}

// ─── Paths ───────────────────────────────────────────────────────────

/// `collection/id` address of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    pub collection: String,
    pub id: String,
}

impl StorePath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for StorePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((collection, id)) if !collection.is_empty() && !id.is_empty() => {
                Ok(Self::new(collection, id))
            }
            _ => Err(StoreError::InvalidPath(s.to_owned())),
        }
    }
}

// ─── Subscription Handle ─────────────────────────────────────────────

/// Pairs a store-side listener with its detach action.
///
/// Detach runs at most once: later calls are no-ops returning `Ok`.
/// Dropping an attached handle detaches it.
pub struct SubscriptionHandle {
    collection: String,
    listener_id: u64,
    detach: Option<DetachFn>,
}

impl SubscriptionHandle {
    pub fn new(
        collection: impl Into<String>,
        listener_id: u64,
        detach: impl FnOnce() -> Result<(), StoreError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            collection: collection.into(),
            listener_id,
            detach: Some(Box::new(detach)),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn listener_id(&self) -> u64 {
        self.listener_id
    }

    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }

    /// Detach the listener. The action is consumed even when it fails, so a
    /// failed detach is never retried through this handle.
    pub fn detach(&mut self) -> Result<(), StoreError> {
        match self.detach.take() {
            Some(action) => action(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("collection", &self.collection)
            .field("listener_id", &self.listener_id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.detach() {
            tracing::warn!(
                "detach on drop failed for {} listener {}: {e}",
                self.collection,
                self.listener_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handle(count: &Arc<AtomicUsize>) -> SubscriptionHandle {
        let count = Arc::clone(count);
        SubscriptionHandle::new("users", 7, move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn detach_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut handle = counting_handle(&count);
        assert!(handle.is_attached());
        handle.detach().expect("first detach");
        handle.detach().expect("second detach is a no-op");
        assert!(!handle.is_attached());
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_detaches() {
        let count = Arc::new(AtomicUsize::new(0));
        drop(counting_handle(&count));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_detach_is_not_retried() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut handle = SubscriptionHandle::new("cards", 1, move || {
            c.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unreachable("peer gone".into()))
        });
        assert!(handle.detach().is_err());
        assert!(handle.detach().is_ok());
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handle_debug_shows_state() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = counting_handle(&count);
        let s = format!("{handle:?}");
        assert!(s.contains("users"));
        assert!(s.contains("attached: true"));
    }

    #[test]
    fn store_path_parse_and_display() {
        let p: StorePath = "users/u1".parse().expect("valid path");
        assert_eq!(p, StorePath::new("users", "u1"));
        assert_eq!(p.to_string(), "users/u1");

        let nested: StorePath = "chat/room/42".parse().expect("valid path");
        assert_eq!(nested.id, "room/42");
    }

    #[test]
    fn store_path_rejects_malformed() {
        for bad in ["users", "/u1", "users/", ""] {
            assert!(matches!(
                bad.parse::<StorePath>(),
                Err(StoreError::InvalidPath(_))
            ));
        }
    }
}
