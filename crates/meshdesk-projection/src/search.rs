//! Bounded "wait for a matching record" over a live collection.
//!
//! One deadline, one resolution: the search races "a matching record is
//! projected" against `tokio::time::timeout` and yields either
//! `Found(record)` or `NotFound`. A no-match is a value, never an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use meshdesk_core::types::{EntityRecord, EntityType, ProjectionChange};
use meshdesk_store::WatchableStore;

use crate::error::ProjectionError;
use crate::live::{ChangeListener, LiveProjection, ProjectionOptions};
use crate::registry::ProjectionRegistry;

/// Field whose comparison ignores ASCII case.
const EMAIL_FIELD: &str = "email";

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(EntityRecord),
    NotFound,
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_record(self) -> Option<EntityRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound => None,
        }
    }
}

/// "Records of `entity_type` whose string `field` equals `needle`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldQuery {
    pub entity_type: EntityType,
    pub field: String,
    pub needle: String,
}

impl FieldQuery {
    pub fn new(entity_type: EntityType, field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            entity_type,
            field: field.into(),
            needle: needle.into(),
        }
    }

    /// Look up a user by email address.
    pub fn email(needle: impl Into<String>) -> Self {
        Self::new(EntityType::Users, EMAIL_FIELD, needle)
    }

    pub fn matches(&self, record: &EntityRecord) -> bool {
        if record.entity_type != self.entity_type {
            return false;
        }
        match record.field_str(&self.field) {
            Some(v) if self.field == EMAIL_FIELD => v.eq_ignore_ascii_case(&self.needle),
            Some(v) => v == self.needle,
            None => false,
        }
    }
}

/// Open a scoped projection of `query.entity_type` and wait up to `timeout`
/// for a matching record. The projection is always stopped before return.
///
/// Only a failed subscription is an error; running out of time is
/// `Ok(SearchOutcome::NotFound)`.
pub async fn find_by_field(
    store: Arc<dyn WatchableStore>,
    query: &FieldQuery,
    timeout: Duration,
    options: ProjectionOptions,
) -> Result<SearchOutcome, ProjectionError> {
    let (tx, mut rx) = watch::channel(0u64);
    let on_change: ChangeListener = Arc::new(move |change: &ProjectionChange| {
        tx.send_replace(change.version);
    });

    let mut projection = LiveProjection::new(store, options);
    projection.start(query.entity_type, on_change)?;

    let waited = tokio::time::timeout(timeout, async {
        loop {
            if let Some(record) = projection.find_record(|r| query.matches(r)) {
                return record;
            }
            if rx.changed().await.is_err() {
                // Sender lives in the store's callback; only the deadline can end this now.
                std::future::pending::<()>().await;
            }
        }
    })
    .await;

    if let Err(e) = projection.stop() {
        warn!("search projection for {} did not detach cleanly: {e}", query.entity_type);
    }

    Ok(resolve(query, waited.ok(), timeout))
}

/// Same race over an already-started registry, driven by its change channel.
///
/// Resolves to `NotFound` immediately when the registry does not project
/// `query.entity_type`.
pub async fn find_in_registry(
    registry: &ProjectionRegistry,
    query: &FieldQuery,
    timeout: Duration,
) -> SearchOutcome {
    let Some(projection) = registry.projection(query.entity_type) else {
        debug!("search: registry has no {} projection", query.entity_type);
        return SearchOutcome::NotFound;
    };
    let mut changes = registry.changes();

    let waited = tokio::time::timeout(timeout, async {
        loop {
            if let Some(record) = projection.find_record(|r| query.matches(r)) {
                return record;
            }
            if changes.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    })
    .await;

    resolve(query, waited.ok(), timeout)
}

fn resolve(query: &FieldQuery, found: Option<EntityRecord>, timeout: Duration) -> SearchOutcome {
    match found {
        Some(record) => {
            debug!(
                "search: {}.{} matched {}",
                query.entity_type, query.field, record.id
            );
            SearchOutcome::Found(record)
        }
        None => {
            debug!(
                "search: {}.{} = {:?} not found within {}ms",
                query.entity_type,
                query.field,
                query.needle,
                timeout.as_millis()
            );
            SearchOutcome::NotFound
        }
    }
}
