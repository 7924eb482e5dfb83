//! Shared setup for commands: the store and the projection registry.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use meshdesk_core::types::{EntityType, ProjectionChange, RegistrySnapshot};
use meshdesk_projection::ProjectionRegistry;
use meshdesk_store::MemoryStore;

use crate::config::Config;

pub fn open_store(path: &Path) -> anyhow::Result<MemoryStore> {
    let store = MemoryStore::load_dump(path)
        .with_context(|| format!("loading store dump {}", path.display()))?;
    debug!("loaded store dump {}", path.display());
    Ok(store)
}

/// Project `types`, take one snapshot and release every subscription.
pub fn snapshot_once(
    store: &MemoryStore,
    config: &Config,
    types: &[EntityType],
) -> anyhow::Result<RegistrySnapshot> {
    let mut registry = ProjectionRegistry::new(Arc::new(store.clone()), config.projection_options());
    registry
        .start_all(
            types,
            Arc::new(|change: &ProjectionChange| {
                debug!("{} {} {:?}", change.entity_type, change.id, change.kind);
            }),
        )
        .context("starting projections")?;
    let snapshot = registry.snapshot();
    let failures = registry.stop_all();
    if !failures.is_empty() {
        warn!("{} projections did not detach cleanly", failures.len());
    }
    Ok(snapshot)
}

/// Milliseconds since the Unix epoch, for the graph controller clock.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
