//! meshdesk-graph: renderer-agnostic relationship graph view.
//!
//! `adapter` maps the generic node/edge model to a renderer's schema and
//! back, `engine` is the capability surface a concrete renderer exposes,
//! `renderers` holds one adapter per supported engine plus a headless
//! engine, and `controller` drives one renderer instance's lifecycle.

pub mod adapter;
pub mod controller;
pub mod engine;
pub mod error;
pub mod renderers;

pub use adapter::{GraphModelAdapter, InteractionEvent, LayoutDirective};
pub use controller::{ControllerOptions, GraphViewController, ViewState};
pub use engine::{
    HostSurface, RendererHandle, RendererOptions, RenderingEngine, ResizeCallback, ResizeListenerId,
};
pub use error::{GraphError, RendererFault};
pub use renderers::{CytoscapeAdapter, ForceGraphAdapter};
