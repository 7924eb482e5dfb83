//! meshdesk-core: entity model, payload summarizer and generic graph model.
//!
//! Pure library. No IO, no async; everything here is deterministic and
//! safe to call from any projection or renderer thread.

pub mod graph;
pub mod summarize;
pub mod types;

pub use graph::{GraphEdge, GraphModel, GraphNode, derive_graph};
pub use summarize::{DEFAULT_THRESHOLD_BYTES, PayloadSummary, Summarized, SummaryKind, summarize};
pub use types::{
    ChangeKind, CoreError, EntityRecord, EntityType, ProjectedValue, ProjectionChange,
    ProjectionSnapshot, RegistrySnapshot,
};
