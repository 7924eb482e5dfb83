//! Error types for projections and registries.

use meshdesk_core::EntityType;
use meshdesk_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("projection for {0} already started")]
    AlreadyStarted(EntityType),

    #[error("registry already started")]
    RegistryAlreadyStarted,

    #[error("subscription to {entity_type} failed: {source}")]
    Subscription {
        entity_type: EntityType,
        #[source]
        source: StoreError,
    },

    #[error("detaching {entity_type} subscription failed: {source}")]
    Detach {
        entity_type: EntityType,
        #[source]
        source: StoreError,
    },
}
