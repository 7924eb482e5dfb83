//! Headless rendering engine and host surface.
//!
//! Records every call instead of drawing. The CLI mounts it to produce the
//! native model without a display; tests use it to inject renderer faults
//! and emit interaction callbacks.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::adapter::LayoutDirective;
use crate::engine::{
    EventHandler, HostSurface, RendererHandle, RendererOptions, RenderingEngine, ResizeCallback,
    ResizeListenerId,
};
use crate::error::RendererFault;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RendererCall {
    Create { width: u32, height: u32 },
    SetData,
    UpdateData,
    RunLayout(String),
    Resize { width: u32, height: u32 },
    Fit,
    Destroy,
}

/// Operations a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    Create,
    SetData,
    UpdateData,
    Layout,
    Fit,
}

struct EngineState<M, E> {
    calls: Vec<RendererCall>,
    model: Option<M>,
    handlers: Vec<EventHandler<E>>,
    failing: BTreeSet<FailPoint>,
}

/// Shared by the engine and every handle it creates.
pub struct HeadlessEngine<M, E> {
    state: Arc<Mutex<EngineState<M, E>>>,
}

impl<M, E> Clone for HeadlessEngine<M, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<M, E> Default for HeadlessEngine<M, E> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                calls: Vec::new(),
                model: None,
                handlers: Vec::new(),
                failing: BTreeSet::new(),
            })),
        }
    }
}

impl<M: Clone, E> HeadlessEngine<M, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, point: FailPoint, failing: bool) {
        let mut state = lock(&self.state);
        if failing {
            state.failing.insert(point);
        } else {
            state.failing.remove(&point);
        }
    }

    pub fn calls(&self) -> Vec<RendererCall> {
        lock(&self.state).calls.clone()
    }

    pub fn count(&self, call: &RendererCall) -> usize {
        lock(&self.state).calls.iter().filter(|c| *c == call).count()
    }

    /// Model most recently accepted by a handle.
    pub fn last_model(&self) -> Option<M> {
        lock(&self.state).model.clone()
    }

    /// Deliver a raw event to every registered handler.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<EventHandler<E>> = lock(&self.state).handlers.clone();
        for handler in handlers {
            handler(event);
        }
    }
}

fn record<M, E>(
    state: &Mutex<EngineState<M, E>>,
    point: Option<FailPoint>,
    call: RendererCall,
) -> Result<(), RendererFault> {
    let mut state = lock(state);
    if let Some(point) = point.filter(|p| state.failing.contains(p)) {
        return Err(RendererFault::new(format!("injected {point:?} failure")));
    }
    state.calls.push(call);
    Ok(())
}

impl<M: Clone, E> RenderingEngine for HeadlessEngine<M, E> {
    type Handle = HeadlessHandle<M, E>;

    fn create(
        &self,
        _surface: &dyn HostSurface,
        options: &RendererOptions,
    ) -> Result<HeadlessHandle<M, E>, RendererFault> {
        record(
            &self.state,
            Some(FailPoint::Create),
            RendererCall::Create {
                width: options.width,
                height: options.height,
            },
        )?;
        Ok(HeadlessHandle {
            state: Arc::clone(&self.state),
            destroyed: false,
            _event: PhantomData,
        })
    }
}

pub struct HeadlessHandle<M, E> {
    state: Arc<Mutex<EngineState<M, E>>>,
    destroyed: bool,
    _event: PhantomData<fn(&E)>,
}

impl<M: Clone, E> HeadlessHandle<M, E> {
    fn accept(&self, point: FailPoint, call: RendererCall, model: &M) -> Result<(), RendererFault> {
        self.live()?;
        record(&self.state, Some(point), call)?;
        lock(&self.state).model = Some(model.clone());
        Ok(())
    }

    fn live(&self) -> Result<(), RendererFault> {
        if self.destroyed {
            return Err(RendererFault::new("renderer destroyed"));
        }
        Ok(())
    }
}

impl<M: Clone, E> RendererHandle for HeadlessHandle<M, E> {
    type Model = M;
    type Event = E;

    fn set_data(&mut self, model: &M) -> Result<(), RendererFault> {
        self.accept(FailPoint::SetData, RendererCall::SetData, model)
    }

    fn update_data(&mut self, model: &M) -> Result<(), RendererFault> {
        self.accept(FailPoint::UpdateData, RendererCall::UpdateData, model)
    }

    fn run_layout(&mut self, layout: &LayoutDirective) -> Result<(), RendererFault> {
        self.live()?;
        record(
            &self.state,
            Some(FailPoint::Layout),
            RendererCall::RunLayout(layout.name.clone()),
        )
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RendererFault> {
        self.live()?;
        record(&self.state, None, RendererCall::Resize { width, height })
    }

    fn fit(&mut self) -> Result<(), RendererFault> {
        self.live()?;
        record(&self.state, Some(FailPoint::Fit), RendererCall::Fit)
    }

    fn on_event(&mut self, handler: EventHandler<E>) {
        lock(&self.state).handlers.push(handler);
    }

    fn destroy(&mut self) -> Result<(), RendererFault> {
        self.live()?;
        self.destroyed = true;
        let mut state = lock(&self.state);
        state.handlers.clear();
        state.calls.push(RendererCall::Destroy);
        Ok(())
    }
}

// ─── Surface ─────────────────────────────────────────────────────────

#[derive(Default)]
struct SurfaceState {
    attached: bool,
    width: u32,
    height: u32,
    listeners: BTreeMap<ResizeListenerId, ResizeCallback>,
    next_listener: u64,
}

/// In-memory container. Clones share state so a test can keep a handle
/// after giving the surface to a controller.
#[derive(Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                attached: true,
                width,
                height,
                ..SurfaceState::default()
            })),
        }
    }

    /// Not yet laid out by the host.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attach(&self, width: u32, height: u32) {
        let mut state = lock(&self.state);
        state.attached = true;
        state.width = width;
        state.height = height;
    }

    /// Change the size as the host would and notify every listener.
    pub fn fire_resize(&self, width: u32, height: u32) {
        let listeners: Vec<ResizeCallback> = {
            let mut state = lock(&self.state);
            state.width = width;
            state.height = height;
            state.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(width, height);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

impl HostSurface for HeadlessSurface {
    fn is_attached(&self) -> bool {
        lock(&self.state).attached
    }

    fn size(&self) -> (u32, u32) {
        let state = lock(&self.state);
        (state.width, state.height)
    }

    fn add_resize_listener(&mut self, on_resize: ResizeCallback) -> ResizeListenerId {
        let mut state = lock(&self.state);
        let id = ResizeListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.insert(id, on_resize);
        id
    }

    fn remove_resize_listener(&mut self, id: ResizeListenerId) {
        lock(&self.state).listeners.remove(&id);
    }
}
