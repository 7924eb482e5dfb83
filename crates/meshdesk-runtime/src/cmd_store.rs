//! `meshdesk get` / `meshdesk put`: single-record inspection and repair.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};

use meshdesk_core::types::EntityType;
use meshdesk_store::{MemoryStore, StorePath, WatchableStore};

use crate::cli::{GetOpts, PutOpts};

pub fn cmd_get(store: &MemoryStore, opts: &GetOpts) -> anyhow::Result<Option<Value>> {
    let path = StorePath::new(&opts.collection, &opts.id);
    store
        .get_once(&path)
        .with_context(|| format!("reading {path}"))
}

/// Apply the write, then save the whole store back to `dump`.
pub fn cmd_put(store: &MemoryStore, opts: &PutOpts, dump: &Path) -> anyhow::Result<StorePath> {
    let path = StorePath::new(&opts.collection, &opts.id);
    if opts.collection.parse::<EntityType>().is_err() {
        warn!("{} is not a known entity type collection", opts.collection);
    }

    let value = match (&opts.json, opts.tombstone) {
        (_, true) => None,
        (Some(text), false) => Some(
            serde_json::from_str::<Value>(text)
                .with_context(|| format!("parsing value for {path}"))?,
        ),
        (None, false) => anyhow::bail!("a JSON value or --tombstone is required"),
    };
    let tombstone = value.is_none();

    store
        .put(&path, value)
        .with_context(|| format!("writing {path}"))?;
    store
        .save_dump(dump)
        .with_context(|| format!("saving store dump {}", dump.display()))?;

    if tombstone {
        info!("tombstoned {path}");
    } else {
        info!("wrote {path}");
    }
    Ok(path)
}
