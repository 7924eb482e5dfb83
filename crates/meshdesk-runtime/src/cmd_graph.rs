//! `meshdesk graph`: derive the relationship graph from a snapshot and
//! print the chosen renderer's native model.
//!
//! The model is produced by mounting a headless renderer through the same
//! controller a live view uses, so the output is exactly what the renderer
//! would receive.

use serde::Serialize;
use serde_json::Value;

use meshdesk_core::graph::{GraphModel, derive_graph};
use meshdesk_graph::renderers::cytoscape::CytoscapeLayout;
use meshdesk_graph::renderers::headless::{HeadlessEngine, HeadlessSurface};
use meshdesk_graph::{
    ControllerOptions, CytoscapeAdapter, ForceGraphAdapter, GraphModelAdapter, GraphViewController,
};
use meshdesk_store::MemoryStore;

use crate::cli::{GraphOpts, RendererKind};
use crate::config::Config;
use crate::context::{now_ms, snapshot_once};

/// Viewport of the headless surface.
const SURFACE_WIDTH: u32 = 1280;
const SURFACE_HEIGHT: u32 = 800;

#[derive(Serialize)]
struct GraphOutput<M> {
    renderer: &'static str,
    nodes: usize,
    edges: usize,
    model: M,
}

pub fn cmd_graph(store: &MemoryStore, config: &Config, opts: &GraphOpts) -> anyhow::Result<Value> {
    let types = config.resolve_types(&opts.types)?;
    let snapshot = snapshot_once(store, config, &types)?;
    let graph = derive_graph(&snapshot);
    tracing::info!(
        "graph: {} nodes, {} edges from {} entries",
        graph.nodes.len(),
        graph.edges.len(),
        snapshot.total_entries()
    );

    let options = config.controller_options();
    match opts.renderer.unwrap_or(config.renderer) {
        RendererKind::Cytoscape => {
            let layout = if opts.hierarchical {
                CytoscapeLayout::Breadthfirst
            } else {
                CytoscapeLayout::Cose
            };
            render(CytoscapeAdapter::new(layout), graph, options)
        }
        RendererKind::ForceGraph => render(ForceGraphAdapter, graph, options),
    }
}

fn render<A>(adapter: A, graph: GraphModel, options: ControllerOptions) -> anyhow::Result<Value>
where
    A: GraphModelAdapter + 'static,
{
    let engine: HeadlessEngine<A::Model, A::NativeEvent> = HeadlessEngine::new();
    let mut view = GraphViewController::new(adapter, engine, options);
    let (nodes, edges) = (graph.nodes.len(), graph.edges.len());

    let started = now_ms();
    view.update_data(graph.nodes, graph.edges, started)?;
    view.mount(HeadlessSurface::new(SURFACE_WIDTH, SURFACE_HEIGHT), started)?;
    view.layout_settled(now_ms());

    let model = view
        .model()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("renderer accepted no model"))?;
    let out = GraphOutput {
        renderer: view.adapter().name(),
        nodes,
        edges,
        model,
    };
    view.unmount();
    Ok(serde_json::to_value(out)?)
}
