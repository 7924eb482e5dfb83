//! Error types for the store boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("listener registration rejected for {collection}: {reason}")]
    Rejected { collection: String, reason: String },

    #[error("invalid store path: {0}")]
    InvalidPath(String),

    #[error("invalid store dump: {0}")]
    InvalidDump(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
