//! LiveProjection: mirrors one store collection into a local map.
//!
//! Each store event is applied under the projection's mutex: a tombstone
//! removes the id, anything else is stored through the payload summarizer.
//! Every applied event produces exactly one change notification, delivered
//! after the mutex is released.
//!
//! `stop()` flips the attached flag under the same mutex before detaching,
//! so no mutation can land after it returns even if the store still has a
//! delivery in flight. A generation counter keeps handlers from an earlier
//! `start` out of a later one.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use meshdesk_core::summarize::DEFAULT_THRESHOLD_BYTES;
use meshdesk_core::types::{
    ChangeKind, EntityRecord, EntityType, ProjectedValue, ProjectionChange, ProjectionSnapshot,
};
use meshdesk_store::{StoreCallback, SubscriptionHandle, WatchableStore};

use crate::error::ProjectionError;

/// Receives one call per applied event.
pub type ChangeListener = Arc<dyn Fn(&ProjectionChange) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Serialized size above which values are summarized.
    pub threshold_bytes: usize,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    attached: bool,
    generation: u64,
    entries: HashMap<String, ProjectedValue>,
    version: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LiveProjection {
    store: Arc<dyn WatchableStore>,
    options: ProjectionOptions,
    shared: Arc<Mutex<Shared>>,
    active: Option<(EntityType, SubscriptionHandle)>,
    entity_type: Option<EntityType>,
}

impl LiveProjection {
    pub fn new(store: Arc<dyn WatchableStore>, options: ProjectionOptions) -> Self {
        Self {
            store,
            options,
            shared: Arc::new(Mutex::new(Shared::default())),
            active: None,
            entity_type: None,
        }
    }

    /// Open the store subscription for `entity_type`.
    ///
    /// Fails with `AlreadyStarted` while a subscription is open. Entries from
    /// a previous run are cleared. If the store rejects the listener the
    /// projection stays stopped and `start` may be retried.
    pub fn start(
        &mut self,
        entity_type: EntityType,
        on_change: ChangeListener,
    ) -> Result<(), ProjectionError> {
        if let Some((current, _)) = &self.active {
            return Err(ProjectionError::AlreadyStarted(*current));
        }

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.attached = true;
            shared.entries.clear();
            shared.version = 0;
            shared.generation
        };
        self.entity_type = Some(entity_type);

        let shared = Arc::clone(&self.shared);
        let threshold = self.options.threshold_bytes;
        let callback: StoreCallback = Arc::new(move |id: &str, value: Option<&Value>| {
            apply_event(&shared, generation, entity_type, threshold, &on_change, id, value);
        });

        match self.store.subscribe_all(entity_type.collection(), callback) {
            Ok(handle) => {
                debug!(
                    "{entity_type} projection attached (listener {})",
                    handle.listener_id()
                );
                self.active = Some((entity_type, handle));
                Ok(())
            }
            Err(source) => {
                lock(&self.shared).attached = false;
                Err(ProjectionError::Subscription {
                    entity_type,
                    source,
                })
            }
        }
    }

    /// Detach the subscription. Idempotent, and a no-op before `start`.
    ///
    /// Entries applied so far stay readable; no further event is applied
    /// once this returns, even when the store-side detach fails.
    pub fn stop(&mut self) -> Result<(), ProjectionError> {
        lock(&self.shared).attached = false;
        let Some((entity_type, mut handle)) = self.active.take() else {
            return Ok(());
        };
        debug!("{entity_type} projection detaching");
        handle
            .detach()
            .map_err(|source| ProjectionError::Detach {
                entity_type,
                source,
            })
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    /// Entity type of the current or most recent subscription.
    pub fn entity_type(&self) -> Option<EntityType> {
        self.entity_type
    }

    /// Number of events applied since the last `start`.
    pub fn version(&self) -> u64 {
        lock(&self.shared).version
    }

    pub fn len(&self) -> usize {
        lock(&self.shared).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<ProjectedValue> {
        lock(&self.shared).entries.get(id).cloned()
    }

    /// Owned copy of the current entries, ordered by id.
    pub fn snapshot(&self) -> ProjectionSnapshot {
        lock(&self.shared)
            .entries
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>()
    }

    /// First full record (in id order) matching `predicate`.
    pub fn find_record(&self, predicate: impl Fn(&EntityRecord) -> bool) -> Option<EntityRecord> {
        let shared = lock(&self.shared);
        let mut matches: Vec<&EntityRecord> = shared
            .entries
            .values()
            .filter_map(ProjectedValue::as_record)
            .filter(|r| predicate(r))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.first().map(|r| (*r).clone())
    }
}

impl Drop for LiveProjection {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("stopping projection on drop failed: {e}");
        }
    }
}

fn apply_event(
    shared: &Mutex<Shared>,
    generation: u64,
    entity_type: EntityType,
    threshold: usize,
    on_change: &ChangeListener,
    id: &str,
    value: Option<&Value>,
) {
    let change = {
        let mut shared = lock(shared);
        if !shared.attached || shared.generation != generation {
            return;
        }
        shared.version += 1;
        let kind = match value {
            Some(v) => {
                let projected = ProjectedValue::project(entity_type, id, v, threshold);
                shared.entries.insert(id.to_owned(), projected);
                ChangeKind::Upserted
            }
            None => {
                shared.entries.remove(id);
                ChangeKind::Removed
            }
        };
        ProjectionChange {
            entity_type,
            id: id.to_owned(),
            kind,
            version: shared.version,
        }
    };
    on_change(&change);
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshdesk_store::{MemoryStore, StoreError, StorePath};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, ChangeListener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let listener: ChangeListener = Arc::new(move |_: &ProjectionChange| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    fn noop() -> ChangeListener {
        Arc::new(|_: &ProjectionChange| {})
    }

    fn users(id: &str) -> StorePath {
        StorePath::new("users", id)
    }

    struct RejectingStore;

    impl WatchableStore for RejectingStore {
        fn subscribe_all(
            &self,
            collection: &str,
            _callback: StoreCallback,
        ) -> Result<SubscriptionHandle, StoreError> {
            Err(StoreError::Rejected {
                collection: collection.to_owned(),
                reason: "offline".into(),
            })
        }

        fn put(&self, _path: &StorePath, _value: Option<Value>) -> Result<(), StoreError> {
            Ok(())
        }

        fn get_once(&self, _path: &StorePath) -> Result<Option<Value>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn upsert_then_tombstone_removes_key() {
        let store = MemoryStore::new();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(EntityType::Users, noop()).unwrap();

        store.put(&users("u1"), Some(json!({"email": "a@x.com"}))).unwrap();
        assert!(p.get("u1").is_some());
        store.put(&users("u1"), None).unwrap();
        assert!(p.get("u1").is_none());
        assert!(p.is_empty());
    }

    #[test]
    fn replayed_records_are_projected() {
        let store = MemoryStore::from_dump(json!({"cards": {"c1": {"title": "Ace"}}})).unwrap();
        let mut p = LiveProjection::new(Arc::new(store), ProjectionOptions::default());
        p.start(EntityType::Cards, noop()).unwrap();
        let record = p.get("c1").and_then(|v| v.as_record().cloned()).unwrap();
        assert_eq!(record.field_str("title"), Some("Ace"));
        assert_eq!(record.entity_type, EntityType::Cards);
    }

    #[test]
    fn one_notification_per_applied_event() {
        let store = MemoryStore::new();
        let (count, listener) = counter();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(EntityType::Users, listener).unwrap();

        store.put(&users("u1"), Some(json!(1))).unwrap();
        store.put(&users("u1"), Some(json!(2))).unwrap();
        store.put(&users("u2"), None).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(p.version(), 3);
    }

    #[test]
    fn change_carries_kind_and_version() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(
            EntityType::Decks,
            Arc::new(move |c: &ProjectionChange| sink.lock().unwrap().push(c.clone())),
        )
        .unwrap();

        store.put(&StorePath::new("decks", "d1"), Some(json!({}))).unwrap();
        store.put(&StorePath::new("decks", "d1"), None).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].kind, ChangeKind::Upserted);
        assert_eq!(seen[1].kind, ChangeKind::Removed);
        assert_eq!(seen[1].version, 2);
        assert_eq!(seen[1].entity_type, EntityType::Decks);
    }

    #[test]
    fn oversized_values_are_summarized() {
        let store = MemoryStore::new();
        let mut p = LiveProjection::new(
            Arc::new(store.clone()),
            ProjectionOptions { threshold_bytes: 100 },
        );
        p.start(EntityType::Chat, noop()).unwrap();
        store
            .put(&StorePath::new("chat", "m1"), Some(json!({"text": "x".repeat(500)})))
            .unwrap();
        assert!(p.get("m1").unwrap().is_summary());
    }

    #[test]
    fn start_twice_is_already_started() {
        let store = MemoryStore::new();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(EntityType::Users, noop()).unwrap();
        let err = p.start(EntityType::Users, noop()).unwrap_err();
        assert!(matches!(err, ProjectionError::AlreadyStarted(EntityType::Users)));
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn stop_is_idempotent_and_safe_before_start() {
        let store = MemoryStore::new();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.stop().unwrap();
        p.start(EntityType::Users, noop()).unwrap();
        p.stop().unwrap();
        p.stop().unwrap();
        assert_eq!(store.listener_count(), 0);
        assert!(!p.is_started());
    }

    #[test]
    fn no_mutation_or_notification_after_stop() {
        let store = MemoryStore::new();
        let (count, listener) = counter();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(EntityType::Users, listener).unwrap();
        store.put(&users("u1"), Some(json!(1))).unwrap();
        p.stop().unwrap();

        store.put(&users("u2"), Some(json!(2))).unwrap();
        store.put(&users("u1"), None).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // Applied state is kept, not rolled back.
        assert!(p.get("u1").is_some());
        assert!(p.get("u2").is_none());
    }

    #[test]
    fn stale_handler_from_earlier_start_is_ignored() {
        let store = MemoryStore::new();
        let captured: Arc<Mutex<Option<StoreCallback>>> = Arc::new(Mutex::new(None));

        struct Capturing {
            inner: MemoryStore,
            captured: Arc<Mutex<Option<StoreCallback>>>,
        }
        impl WatchableStore for Capturing {
            fn subscribe_all(
                &self,
                collection: &str,
                callback: StoreCallback,
            ) -> Result<SubscriptionHandle, StoreError> {
                self.captured.lock().unwrap().get_or_insert(Arc::clone(&callback));
                self.inner.subscribe_all(collection, callback)
            }
            fn put(&self, path: &StorePath, value: Option<Value>) -> Result<(), StoreError> {
                self.inner.put(path, value)
            }
            fn get_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
                self.inner.get_once(path)
            }
        }

        let wrapped = Capturing {
            inner: store.clone(),
            captured: Arc::clone(&captured),
        };
        let mut p = LiveProjection::new(Arc::new(wrapped), ProjectionOptions::default());
        p.start(EntityType::Users, noop()).unwrap();
        p.stop().unwrap();
        p.start(EntityType::Users, noop()).unwrap();

        let first_gen = captured.lock().unwrap().clone().unwrap();
        first_gen("ghost", Some(&json!(1)));
        assert!(p.get("ghost").is_none());
    }

    #[test]
    fn restart_clears_previous_entries() {
        let store = MemoryStore::new();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(EntityType::Users, noop()).unwrap();
        store.put(&users("u1"), Some(json!(1))).unwrap();
        p.stop().unwrap();
        store.put(&users("u1"), None).unwrap();

        p.start(EntityType::Users, noop()).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.version(), 0);
    }

    #[test]
    fn rejected_subscription_leaves_projection_stopped() {
        let mut p = LiveProjection::new(Arc::new(RejectingStore), ProjectionOptions::default());
        let err = p.start(EntityType::Cards, noop()).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::Subscription {
                entity_type: EntityType::Cards,
                ..
            }
        ));
        assert!(!p.is_started());
        p.stop().unwrap();
    }

    #[test]
    fn drop_detaches_listener() {
        let store = MemoryStore::new();
        {
            let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
            p.start(EntityType::Users, noop()).unwrap();
            assert_eq!(store.listener_count(), 1);
        }
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn snapshot_is_independent_copy() {
        let store = MemoryStore::new();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(EntityType::Users, noop()).unwrap();
        store.put(&users("u1"), Some(json!(1))).unwrap();
        let snap = p.snapshot();
        store.put(&users("u2"), Some(json!(2))).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn concurrent_writers_fold_to_last_write_per_id() {
        const WRITERS: usize = 4;
        const IDS: usize = 5;
        const ROUNDS: usize = 25;

        let store = MemoryStore::new();
        let (count, listener) = counter();
        let mut p = LiveProjection::new(Arc::new(store.clone()), ProjectionOptions::default());
        p.start(EntityType::Users, listener).unwrap();

        std::thread::scope(|scope| {
            for w in 0..WRITERS {
                let store = store.clone();
                scope.spawn(move || {
                    for round in 0..ROUNDS {
                        for i in 0..IDS {
                            let path = users(&format!("w{w}-u{i}"));
                            // Odd ids end on a tombstone, even ids on an upsert.
                            let value = if i % 2 == 1 && round == ROUNDS - 1 {
                                None
                            } else {
                                Some(json!({"writer": w, "round": round}))
                            };
                            store.put(&path, value).unwrap();
                        }
                    }
                });
            }
        });

        let total = WRITERS * IDS * ROUNDS;
        assert_eq!(p.version(), total as u64);
        assert_eq!(count.load(Ordering::SeqCst), total);

        let mut expected = ProjectionSnapshot::new();
        for w in 0..WRITERS {
            for i in (0..IDS).filter(|i| i % 2 == 0) {
                let id = format!("w{w}-u{i}");
                let last = json!({"writer": w, "round": ROUNDS - 1});
                let projected =
                    ProjectedValue::project(EntityType::Users, &id, &last, DEFAULT_THRESHOLD_BYTES);
                expected.insert(id, projected);
            }
        }
        assert_eq!(p.snapshot(), expected);
    }

    #[test]
    fn find_record_returns_lowest_matching_id() {
        let store = MemoryStore::from_dump(json!({"users": {
            "u2": {"role": "admin"},
            "u1": {"role": "admin"},
            "u3": {"role": "member"}
        }}))
        .unwrap();
        let mut p = LiveProjection::new(Arc::new(store), ProjectionOptions::default());
        p.start(EntityType::Users, noop()).unwrap();
        let found = p.find_record(|r| r.field_str("role") == Some("admin")).unwrap();
        assert_eq!(found.id, "u1");
        assert!(p.find_record(|r| r.field_str("role") == Some("owner")).is_none());
    }
}
