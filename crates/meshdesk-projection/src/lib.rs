//! meshdesk-projection: live, incrementally maintained mirrors of store
//! collections.
//!
//! - `live`: one subscription, one id → value map, one change per event
//! - `registry`: all projections a view needs, started and stopped together
//! - `search`: bounded wait for a record matching a field

pub mod error;
pub mod live;
pub mod registry;
pub mod search;

pub use error::ProjectionError;
pub use live::{ChangeListener, LiveProjection, ProjectionOptions};
pub use registry::ProjectionRegistry;
pub use search::{FieldQuery, SearchOutcome, find_by_field, find_in_registry};
