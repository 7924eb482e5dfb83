//! `meshdesk snapshot`: project entity types and print the snapshot.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use meshdesk_core::types::{EntityType, ProjectionSnapshot};
use meshdesk_store::MemoryStore;

use crate::config::Config;
use crate::context::snapshot_once;

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    taken_at: String,
    version: u64,
    projections: &'a BTreeMap<EntityType, ProjectionSnapshot>,
}

pub fn cmd_snapshot(store: &MemoryStore, config: &Config, types: &[String]) -> anyhow::Result<Value> {
    let types = config.resolve_types(types)?;
    let snapshot = snapshot_once(store, config, &types)?;
    tracing::info!(
        "snapshot: {} entries across {} entity types",
        snapshot.total_entries(),
        snapshot.projections.len()
    );
    let out = SnapshotOutput {
        taken_at: Utc::now().to_rfc3339(),
        version: snapshot.version,
        projections: &snapshot.projections,
    };
    Ok(serde_json::to_value(out)?)
}
