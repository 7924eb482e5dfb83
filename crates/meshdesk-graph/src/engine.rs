//! Capability surfaces of a concrete rendering engine and its host.
//!
//! The controller only talks to these traits, so a renderer can be swapped
//! without touching view logic, and tests drive a headless engine.

use std::sync::Arc;

use crate::adapter::LayoutDirective;
use crate::error::RendererFault;

/// Raw renderer event callback.
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Called by the host with the new `(width, height)` of the surface.
pub type ResizeCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Options handed to [`RenderingEngine::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct RendererOptions {
    pub width: u32,
    pub height: u32,
    pub layout: LayoutDirective,
}

pub trait RenderingEngine {
    type Handle: RendererHandle;

    fn create(
        &self,
        surface: &dyn HostSurface,
        options: &RendererOptions,
    ) -> Result<Self::Handle, RendererFault>;
}

/// One live renderer instance.
pub trait RendererHandle {
    type Model;
    type Event;

    /// Replace the whole model.
    fn set_data(&mut self, model: &Self::Model) -> Result<(), RendererFault>;

    /// Apply a changed model incrementally. Engines without diffing fall
    /// back to a full replace.
    fn update_data(&mut self, model: &Self::Model) -> Result<(), RendererFault> {
        self.set_data(model)
    }

    fn run_layout(&mut self, layout: &LayoutDirective) -> Result<(), RendererFault>;

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RendererFault>;

    /// Fit the drawn graph to the viewport.
    fn fit(&mut self) -> Result<(), RendererFault>;

    fn on_event(&mut self, handler: EventHandler<Self::Event>);

    fn destroy(&mut self) -> Result<(), RendererFault>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResizeListenerId(pub u64);

/// Container the renderer draws into.
pub trait HostSurface {
    /// False until the host has laid the container out.
    fn is_attached(&self) -> bool;

    fn size(&self) -> (u32, u32);

    /// Register `on_resize` for size changes of the surface. The host may
    /// call it from any thread.
    fn add_resize_listener(&mut self, on_resize: ResizeCallback) -> ResizeListenerId;

    fn remove_resize_listener(&mut self, id: ResizeListenerId);
}
