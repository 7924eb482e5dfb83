//! GraphViewController: lifecycle of one renderer instance.
//!
//! Pure state machine over an injected engine and host surface. Time is
//! passed in as `now_ms`; the controller never sleeps. Renderers report
//! layout completion unreliably, so the post-layout fit is scheduled at
//! `now_ms + settle_delay_ms` and fired by `tick` (or early by
//! `layout_settled`), exactly once per scheduling.
//!
//! Size changes reported by the host surface are parked by the resize
//! listener and applied on the next `tick`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use meshdesk_core::graph::{GraphEdge, GraphNode};

use crate::adapter::{GraphModelAdapter, InteractionEvent, LayoutDirective};
use crate::engine::{
    EventHandler, HostSurface, RendererHandle, RendererOptions, RenderingEngine, ResizeListenerId,
};
use crate::error::{GraphError, RendererFault};

/// Default wait between a layout run and the fit-to-viewport.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 250;

/// Receives translated interaction events.
pub type InteractionSink = Arc<dyn Fn(&InteractionEvent) + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub settle_delay_ms: u64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Uninitialized,
    Initializing,
    Ready,
    Updating,
    /// Recoverable: `retry`, `update_data` or a fresh `mount`.
    Error(GraphError),
    Destroyed,
}

pub struct GraphViewController<A, E, S>
where
    A: GraphModelAdapter + 'static,
    E: RenderingEngine,
    E::Handle: RendererHandle<Model = A::Model, Event = A::NativeEvent>,
    S: HostSurface,
{
    adapter: Arc<A>,
    engine: E,
    options: ControllerOptions,
    state: ViewState,
    surface: Option<S>,
    handle: Option<E::Handle>,
    resize_listener: Option<ResizeListenerId>,
    /// Latest size reported by the surface, not yet applied.
    pending_resize: Arc<Mutex<Option<(u32, u32)>>>,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Last model the renderer accepted.
    last_good: Option<A::Model>,
    fit_due_ms: Option<u64>,
    sink: Option<InteractionSink>,
}

impl<A, E, S> GraphViewController<A, E, S>
where
    A: GraphModelAdapter + 'static,
    E: RenderingEngine,
    E::Handle: RendererHandle<Model = A::Model, Event = A::NativeEvent>,
    S: HostSurface,
{
    pub fn new(adapter: A, engine: E, options: ControllerOptions) -> Self {
        Self {
            adapter: Arc::new(adapter),
            engine,
            options,
            state: ViewState::Uninitialized,
            surface: None,
            handle: None,
            resize_listener: None,
            pending_resize: Arc::new(Mutex::new(None)),
            nodes: Vec::new(),
            edges: Vec::new(),
            last_good: None,
            fit_due_ms: None,
            sink: None,
        }
    }

    /// Forward translated renderer interactions to `sink`. Takes effect at
    /// the next renderer construction.
    pub fn with_interaction_sink(mut self, sink: InteractionSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.handle.is_some()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Last renderer-native model the renderer accepted.
    pub fn model(&self) -> Option<&A::Model> {
        self.last_good.as_ref()
    }

    pub fn fit_due_ms(&self) -> Option<u64> {
        self.fit_due_ms
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Construct the renderer on `surface`, push the current model and run
    /// the first layout.
    ///
    /// A detached or zero-sized surface is an `Init` error; the state
    /// becomes `Error` and the caller retries on the next frame with
    /// `retry` or another `mount`. Mounting an already mounted view is a
    /// no-op.
    pub fn mount(&mut self, surface: S, now_ms: u64) -> Result<(), GraphError> {
        if self.state == ViewState::Destroyed {
            return Err(GraphError::Destroyed);
        }
        if self.handle.is_some() {
            debug!("{} view already mounted", self.adapter.name());
            return Ok(());
        }
        self.surface = Some(surface);
        self.initialize(now_ms)
    }

    /// Replace the generic model. Before mount the model is only stored.
    ///
    /// A renderer failure leaves the last good model on screen, moves the
    /// view to `Error` and is returned as `Layout`.
    pub fn update_data(
        &mut self,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
        now_ms: u64,
    ) -> Result<(), GraphError> {
        if self.state == ViewState::Destroyed {
            return Err(GraphError::Destroyed);
        }
        self.nodes = nodes;
        self.edges = edges;
        if self.handle.is_none() {
            debug!(
                "{} view not mounted; stored {} nodes / {} edges",
                self.adapter.name(),
                self.nodes.len(),
                self.edges.len()
            );
            return Ok(());
        }

        self.set_state(ViewState::Updating);
        let model = self.adapter.to_renderer_model(&self.nodes, &self.edges);
        let layout = self.adapter.layout_directive();
        let pushed = match self.handle.as_mut() {
            Some(handle) => push_model(handle, &model, &layout, true),
            None => Ok(()),
        };
        match pushed {
            Ok(()) => {
                self.last_good = Some(model);
                self.schedule_fit(now_ms);
                self.set_state(ViewState::Ready);
                Ok(())
            }
            Err(fault) => Err(self.fail_layout(fault)),
        }
    }

    /// Recover from `Error`: re-initialize if no renderer exists yet,
    /// otherwise re-push the last good model. A no-op when healthy.
    pub fn retry(&mut self, now_ms: u64) -> Result<(), GraphError> {
        match &self.state {
            ViewState::Destroyed => return Err(GraphError::Destroyed),
            ViewState::Error(_) => {}
            _ => return Ok(()),
        }
        if self.handle.is_none() {
            if self.surface.is_none() {
                return Err(GraphError::Init("no surface to mount on".into()));
            }
            return self.initialize(now_ms);
        }

        let layout = self.adapter.layout_directive();
        let pushed = match (self.handle.as_mut(), self.last_good.as_ref()) {
            (Some(handle), Some(model)) => push_model(handle, model, &layout, false),
            _ => Ok(()),
        };
        match pushed {
            Ok(()) => {
                self.schedule_fit(now_ms);
                self.set_state(ViewState::Ready);
                Ok(())
            }
            Err(fault) => Err(self.fail_layout(fault)),
        }
    }

    /// Resize the drawing surface and re-fit. The model is not re-derived.
    pub fn resize(&mut self, width: u32, height: u32, now_ms: u64) -> Result<(), GraphError> {
        if self.state == ViewState::Destroyed {
            return Err(GraphError::Destroyed);
        }
        if self.handle.is_none() {
            return Ok(());
        }
        let resumed = self.state.clone();
        self.set_state(ViewState::Updating);
        let resized = match self.handle.as_mut() {
            Some(handle) => handle.resize(width, height).and_then(|()| handle.fit()),
            None => Ok(()),
        };
        match resized {
            Ok(()) => {
                debug!("{} view resized to {width}x{height} at {now_ms}", self.adapter.name());
                self.set_state(resumed);
                Ok(())
            }
            Err(fault) => Err(self.fail_layout(fault)),
        }
    }

    /// Apply a surface resize reported since the last tick, then fire the
    /// scheduled fit once its deadline has passed. Returns whether a fit
    /// ran.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        let resized = self.apply_pending_resize(now_ms);
        let fitted = match self.fit_due_ms {
            Some(due) if now_ms >= due => self.fire_fit(),
            _ => false,
        };
        resized || fitted
    }

    /// The renderer reported layout completion: fit now instead of waiting
    /// for the settle deadline.
    pub fn layout_settled(&mut self, now_ms: u64) -> bool {
        if self.fit_due_ms.is_none() {
            return false;
        }
        debug!("{} layout settled at {now_ms}", self.adapter.name());
        self.fire_fit()
    }

    /// Destroy the renderer exactly once and remove the resize listener.
    /// Idempotent.
    pub fn unmount(&mut self) {
        if self.state == ViewState::Destroyed {
            return;
        }
        self.fit_due_ms = None;
        lock(&self.pending_resize).take();
        if let Some(mut handle) = self.handle.take() {
            if let Err(fault) = handle.destroy() {
                warn!("{} renderer destroy failed: {fault}", self.adapter.name());
            }
        }
        if let (Some(surface), Some(id)) = (self.surface.as_mut(), self.resize_listener.take()) {
            surface.remove_resize_listener(id);
        }
        self.set_state(ViewState::Destroyed);
        info!("{} view unmounted", self.adapter.name());
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn initialize(&mut self, now_ms: u64) -> Result<(), GraphError> {
        self.set_state(ViewState::Initializing);
        match self.try_initialize() {
            Ok(()) => {
                self.schedule_fit(now_ms);
                self.set_state(ViewState::Ready);
                info!(
                    "{} view mounted: {} nodes, {} edges",
                    self.adapter.name(),
                    self.nodes.len(),
                    self.edges.len()
                );
                Ok(())
            }
            Err(err) => {
                warn!("{} view init failed: {err}", self.adapter.name());
                self.set_state(ViewState::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn try_initialize(&mut self) -> Result<(), GraphError> {
        let handler = self.event_handler();
        let Some(surface) = self.surface.as_mut() else {
            return Err(GraphError::Init("no surface to mount on".into()));
        };
        if !surface.is_attached() {
            return Err(GraphError::Init("surface not attached".into()));
        }
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(GraphError::Init(format!(
                "surface has no area ({width}x{height})"
            )));
        }

        let layout = self.adapter.layout_directive();
        let options = RendererOptions {
            width,
            height,
            layout: layout.clone(),
        };
        let mut handle = self
            .engine
            .create(&*surface, &options)
            .map_err(|f| GraphError::Init(f.0))?;

        let model = self.adapter.to_renderer_model(&self.nodes, &self.edges);
        if let Err(fault) = push_model(&mut handle, &model, &layout, false) {
            if let Err(e) = handle.destroy() {
                warn!("discarding half-initialized renderer failed: {e}");
            }
            return Err(GraphError::Init(fault.0));
        }
        handle.on_event(handler);

        let pending = Arc::clone(&self.pending_resize);
        self.resize_listener = Some(surface.add_resize_listener(Arc::new(move |width: u32, height: u32| {
            *lock(&pending) = Some((width, height));
        })));
        self.handle = Some(handle);
        self.last_good = Some(model);
        Ok(())
    }

    fn event_handler(&self) -> EventHandler<A::NativeEvent> {
        let adapter = Arc::clone(&self.adapter);
        let sink = self.sink.clone();
        Arc::new(move |native: &A::NativeEvent| {
            let Some(event) = adapter.from_renderer_event(native) else {
                return;
            };
            if let Some(sink) = &sink {
                sink(&event);
            }
        })
    }

    fn apply_pending_resize(&mut self, now_ms: u64) -> bool {
        let Some((width, height)) = lock(&self.pending_resize).take() else {
            return false;
        };
        if self.handle.is_none() {
            return false;
        }
        self.resize(width, height, now_ms).is_ok()
    }

    fn schedule_fit(&mut self, now_ms: u64) {
        self.fit_due_ms = Some(now_ms.saturating_add(self.options.settle_delay_ms));
    }

    fn fire_fit(&mut self) -> bool {
        self.fit_due_ms = None;
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        match handle.fit() {
            Ok(()) => true,
            Err(fault) => {
                warn!("{} fit failed: {fault}", self.adapter.name());
                false
            }
        }
    }

    fn fail_layout(&mut self, fault: RendererFault) -> GraphError {
        warn!(
            "{} renderer update failed, keeping last good model: {fault}",
            self.adapter.name()
        );
        let err = GraphError::Layout(fault.0);
        self.set_state(ViewState::Error(err.clone()));
        err
    }

    fn set_state(&mut self, next: ViewState) {
        if self.state != next {
            debug!("{} view: {:?} -> {:?}", self.adapter.name(), self.state, next);
        }
        self.state = next;
    }
}

impl<A, E, S> Drop for GraphViewController<A, E, S>
where
    A: GraphModelAdapter + 'static,
    E: RenderingEngine,
    E::Handle: RendererHandle<Model = A::Model, Event = A::NativeEvent>,
    S: HostSurface,
{
    fn drop(&mut self) {
        self.unmount();
    }
}

fn push_model<H: RendererHandle>(
    handle: &mut H,
    model: &H::Model,
    layout: &LayoutDirective,
    incremental: bool,
) -> Result<(), RendererFault> {
    if incremental {
        handle.update_data(model)?;
    } else {
        handle.set_data(model)?;
    }
    handle.run_layout(layout)
}
