//! Renderer faults and the error kinds the graph view surfaces.

use thiserror::Error;

/// Raw failure reported by a rendering engine. Never reaches view code:
/// the controller converts it to a [`GraphError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("renderer fault: {0}")]
pub struct RendererFault(pub String);

impl RendererFault {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Surface or renderer not ready; retry on the next frame.
    #[error("graph view init failed: {0}")]
    Init(String),

    /// Renderer failed during update or layout; last good model retained.
    #[error("graph view layout failed: {0}")]
    Layout(String),

    #[error("graph view already destroyed")]
    Destroyed,
}
