//! ProjectionRegistry: one LiveProjection per entity type, owned by a view.
//!
//! `start_all` is all-or-nothing: a failure rolls back every projection it
//! already started. `stop_all` never aborts early. Consumers read through
//! `snapshot()` or watch the coalescing version channel from `changes()`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use meshdesk_core::types::{EntityType, ProjectionChange, RegistrySnapshot};
use meshdesk_store::WatchableStore;

use crate::error::ProjectionError;
use crate::live::{ChangeListener, LiveProjection, ProjectionOptions};

pub struct ProjectionRegistry {
    store: Arc<dyn WatchableStore>,
    options: ProjectionOptions,
    projections: BTreeMap<EntityType, LiveProjection>,
    started: bool,
    /// Registry-wide applied event count, shared with projection listeners.
    version: Arc<AtomicU64>,
    version_tx: Arc<watch::Sender<u64>>,
}

impl ProjectionRegistry {
    pub fn new(store: Arc<dyn WatchableStore>, options: ProjectionOptions) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            store,
            options,
            projections: BTreeMap::new(),
            started: false,
            version: Arc::new(AtomicU64::new(0)),
            version_tx: Arc::new(version_tx),
        }
    }

    /// Start one projection per distinct entity type.
    ///
    /// If any start fails, the ones already started are stopped (failures
    /// during that rollback are logged) and the original error is returned;
    /// the registry is then not started.
    pub fn start_all(
        &mut self,
        entity_types: &[EntityType],
        on_any_change: ChangeListener,
    ) -> Result<(), ProjectionError> {
        if self.started {
            return Err(ProjectionError::RegistryAlreadyStarted);
        }

        let counter = Arc::clone(&self.version);
        let tx = Arc::clone(&self.version_tx);
        let listener: ChangeListener = Arc::new(move |change: &ProjectionChange| {
            let v = counter.fetch_add(1, Ordering::SeqCst) + 1;
            tx.send_replace(v);
            on_any_change(change);
        });

        let mut started: BTreeMap<EntityType, LiveProjection> = BTreeMap::new();
        for &entity_type in entity_types {
            if started.contains_key(&entity_type) {
                continue;
            }
            let mut projection = LiveProjection::new(Arc::clone(&self.store), self.options.clone());
            if let Err(e) = projection.start(entity_type, Arc::clone(&listener)) {
                warn!(
                    "starting {entity_type} projection failed: {e}; rolling back {} started",
                    started.len()
                );
                for (rolled_back, mut p) in started {
                    if let Err(stop_err) = p.stop() {
                        warn!("rollback of {rolled_back} projection failed: {stop_err}");
                    }
                }
                return Err(e);
            }
            started.insert(entity_type, projection);
        }

        info!("projection registry started: {} entity types", started.len());
        self.projections = started;
        self.started = true;
        Ok(())
    }

    /// Stop every projection, continuing past individual failures.
    ///
    /// Returns the failures (already logged). Idempotent. Projections keep
    /// their last state so a final `snapshot()` is still meaningful.
    pub fn stop_all(&mut self) -> Vec<ProjectionError> {
        let mut failures = Vec::new();
        for (entity_type, projection) in &mut self.projections {
            if let Err(e) = projection.stop() {
                warn!("stopping {entity_type} projection failed: {e}");
                failures.push(e);
            }
        }
        if self.started {
            debug!(
                "projection registry stopped ({} failures)",
                failures.len()
            );
        }
        self.started = false;
        failures
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn entity_types(&self) -> Vec<EntityType> {
        self.projections.keys().copied().collect()
    }

    pub fn projection(&self, entity_type: EntityType) -> Option<&LiveProjection> {
        self.projections.get(&entity_type)
    }

    /// Registry-wide count of applied events.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Version channel; bursts of events coalesce into the latest value.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Immutable copy of every projection, keyed by entity type.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            version: self.version(),
            projections: self
                .projections
                .iter()
                .map(|(t, p)| (*t, p.snapshot()))
                .collect(),
        }
    }
}

impl Drop for ProjectionRegistry {
    fn drop(&mut self) {
        if self.started {
            self.stop_all();
        }
    }
}
