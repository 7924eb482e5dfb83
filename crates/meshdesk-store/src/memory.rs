//! In-process `WatchableStore`.
//!
//! Backs the CLI (loaded from a JSON dump file) and the test suites. New
//! subscribers are replayed the current contents of their collection, then
//! receive every later write synchronously from the writing thread.
//!
//! Dump format: `{ "<collection>": { "<id>": <value>, ... }, ... }`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::StoreError;
use crate::watch::{StoreCallback, StorePath, SubscriptionHandle, WatchableStore};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    /// Serializes put delivery and subscribe replay so per-id order holds.
    /// Callbacks must not write back into the store while it is held.
    delivery: Mutex<()>,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
}

struct Listener {
    collection: String,
    callback: StoreCallback,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a dump value (collection → id → value).
    pub fn from_dump(dump: Value) -> Result<Self, StoreError> {
        let Value::Object(collections) = dump else {
            return Err(StoreError::InvalidDump("top level must be an object".into()));
        };
        let store = Self::new();
        {
            let mut state = lock(&store.inner.state);
            for (collection, records) in collections {
                let Value::Object(records) = records else {
                    return Err(StoreError::InvalidDump(format!(
                        "collection {collection} must be an object"
                    )));
                };
                let entry = state.collections.entry(collection).or_default();
                for (id, value) in records {
                    if !value.is_null() {
                        entry.insert(id, value);
                    }
                }
            }
        }
        Ok(store)
    }

    pub fn load_dump(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_dump(serde_json::from_str(&text)?)
    }

    pub fn to_dump(&self) -> Value {
        let state = lock(&self.inner.state);
        let collections: Map<String, Value> = state
            .collections
            .iter()
            .map(|(name, records)| {
                let records: Map<String, Value> = records
                    .iter()
                    .map(|(id, v)| (id.clone(), v.clone()))
                    .collect();
                (name.clone(), Value::Object(records))
            })
            .collect();
        Value::Object(collections)
    }

    pub fn save_dump(&self, path: &Path) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&self.to_dump())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Number of currently attached listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.state).listeners.len()
    }

    pub fn record_count(&self, collection: &str) -> usize {
        lock(&self.inner.state)
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

impl WatchableStore for MemoryStore {
    fn subscribe_all(
        &self,
        collection: &str,
        callback: StoreCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        let _delivery = lock(&self.inner.delivery);

        let (listener_id, existing) = {
            let mut state = lock(&self.inner.state);
            let listener_id = state.next_listener_id;
            state.next_listener_id += 1;
            state.listeners.insert(
                listener_id,
                Listener {
                    collection: collection.to_owned(),
                    callback: Arc::clone(&callback),
                },
            );
            let existing: Vec<(String, Value)> = state
                .collections
                .get(collection)
                .map(|records| records.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            (listener_id, existing)
        };

        debug!(
            "listener {listener_id} attached to {collection}, replaying {} records",
            existing.len()
        );
        for (id, value) in &existing {
            callback(id, Some(value));
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(SubscriptionHandle::new(collection, listener_id, move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.state).listeners.remove(&listener_id);
                debug!("listener {listener_id} detached");
            }
            Ok(())
        }))
    }

    fn put(&self, path: &StorePath, value: Option<Value>) -> Result<(), StoreError> {
        let _delivery = lock(&self.inner.delivery);

        // Null is the store's own tombstone marker.
        let value = value.filter(|v| !v.is_null());

        let callbacks: Vec<StoreCallback> = {
            let mut state = lock(&self.inner.state);
            match &value {
                Some(v) => {
                    state
                        .collections
                        .entry(path.collection.clone())
                        .or_default()
                        .insert(path.id.clone(), v.clone());
                }
                None => {
                    if let Some(records) = state.collections.get_mut(&path.collection) {
                        records.remove(&path.id);
                    }
                }
            }
            state
                .listeners
                .values()
                .filter(|l| l.collection == path.collection)
                .map(|l| Arc::clone(&l.callback))
                .collect()
        };

        for callback in callbacks {
            callback(&path.id, value.as_ref());
        }
        Ok(())
    }

    fn get_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        Ok(lock(&self.inner.state)
            .collections
            .get(&path.collection)
            .and_then(|records| records.get(&path.id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Log = Arc<Mutex<Vec<(String, Option<Value>)>>>;

    fn recorder() -> (Log, StoreCallback) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let cb: StoreCallback = Arc::new(move |id: &str, v: Option<&Value>| {
            sink.lock().unwrap().push((id.to_owned(), v.cloned()));
        });
        (log, cb)
    }

    #[test]
    fn subscribe_replays_existing_records() {
        let store = MemoryStore::from_dump(json!({
            "users": {"u1": {"email": "a@x.com"}, "u2": {"email": "b@x.com"}},
            "cards": {"c1": {}}
        }))
        .unwrap();
        let (log, cb) = recorder();
        let _h = store.subscribe_all("users", cb).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, "u1");
    }

    #[test]
    fn put_delivers_to_matching_collection_only() {
        let store = MemoryStore::new();
        let (users, cb_users) = recorder();
        let (cards, cb_cards) = recorder();
        let _hu = store.subscribe_all("users", cb_users).unwrap();
        let _hc = store.subscribe_all("cards", cb_cards).unwrap();

        store
            .put(&StorePath::new("users", "u1"), Some(json!({"n": 1})))
            .unwrap();
        assert_eq!(users.lock().unwrap().len(), 1);
        assert!(cards.lock().unwrap().is_empty());
    }

    #[test]
    fn tombstone_removes_and_notifies() {
        let store = MemoryStore::new();
        let path = StorePath::new("users", "u1");
        store.put(&path, Some(json!({"n": 1}))).unwrap();
        let (log, cb) = recorder();
        let _h = store.subscribe_all("users", cb).unwrap();

        store.put(&path, None).unwrap();
        assert_eq!(store.get_once(&path).unwrap(), None);
        assert_eq!(log.lock().unwrap().last(), Some(&("u1".to_owned(), None)));
    }

    #[test]
    fn null_value_is_a_tombstone() {
        let store = MemoryStore::new();
        let path = StorePath::new("cards", "c1");
        store.put(&path, Some(json!({"t": 1}))).unwrap();
        store.put(&path, Some(Value::Null)).unwrap();
        assert_eq!(store.record_count("cards"), 0);
    }

    #[test]
    fn detach_stops_delivery() {
        let store = MemoryStore::new();
        let (log, cb) = recorder();
        let mut handle = store.subscribe_all("users", cb).unwrap();
        assert_eq!(store.listener_count(), 1);

        handle.detach().unwrap();
        handle.detach().unwrap();
        assert_eq!(store.listener_count(), 0);

        store
            .put(&StorePath::new("users", "u1"), Some(json!(1)))
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn dropping_handle_detaches() {
        let store = MemoryStore::new();
        let (_log, cb) = recorder();
        drop(store.subscribe_all("users", cb).unwrap());
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn handle_outliving_store_detaches_quietly() {
        let (_log, cb) = recorder();
        let mut handle = {
            let store = MemoryStore::new();
            store.subscribe_all("users", cb).unwrap()
        };
        assert!(handle.detach().is_ok());
    }

    #[test]
    fn dump_rejects_non_objects() {
        assert!(matches!(
            MemoryStore::from_dump(json!([1, 2])),
            Err(StoreError::InvalidDump(_))
        ));
        assert!(matches!(
            MemoryStore::from_dump(json!({"users": 3})),
            Err(StoreError::InvalidDump(_))
        ));
    }

    #[test]
    fn dump_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dump.json");
        let store = MemoryStore::from_dump(json!({"decks": {"d1": {"size": 3}}})).unwrap();
        store
            .put(&StorePath::new("decks", "d2"), Some(json!({"size": 4})))
            .unwrap();
        store.save_dump(&file).unwrap();

        let loaded = MemoryStore::load_dump(&file).unwrap();
        assert_eq!(loaded.record_count("decks"), 2);
        assert_eq!(
            loaded.get_once(&StorePath::new("decks", "d2")).unwrap(),
            Some(json!({"size": 4}))
        );
    }
}
