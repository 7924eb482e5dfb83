use serde::{Deserialize, Serialize};
use serde_json::json;

use meshdesk_core::graph::{GraphEdge, GraphNode};

use crate::adapter::{
    GraphModelAdapter, InteractionEvent, LayoutDirective, color_for_kind, edge_label, node_label,
    unique_edge_ids,
};

/// Relative node size for records the projection summarized.
const SUMMARIZED_NODE_VAL: u32 = 2;
const NODE_VAL: u32 = 1;

/// Adapter for nodes/links force-simulation renderers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceGraphAdapter;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForceGraphModel {
    pub nodes: Vec<ForceGraphNode>,
    pub links: Vec<ForceGraphLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForceGraphNode {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub color: &'static str,
    pub val: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForceGraphLink {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Callbacks a force-graph engine reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "callback", rename_all = "camelCase")]
pub enum ForceGraphEvent {
    /// `node` is the hovered node, `None` when the pointer left `previous`.
    NodeHover {
        node: Option<String>,
        previous: Option<String>,
    },
    NodeClick {
        node: String,
    },
    NodeRightClick {
        node: String,
        action: Option<String>,
    },
    LinkClick {
        link: String,
    },
    BackgroundClick,
}

impl GraphModelAdapter for ForceGraphAdapter {
    type Model = ForceGraphModel;
    type NativeEvent = ForceGraphEvent;

    fn name(&self) -> &'static str {
        "force-graph"
    }

    fn to_renderer_model(&self, nodes: &[GraphNode], edges: &[GraphEdge]) -> ForceGraphModel {
        ForceGraphModel {
            nodes: nodes
                .iter()
                .map(|n| ForceGraphNode {
                    id: n.id.clone(),
                    name: node_label(n),
                    kind: n.kind.clone(),
                    color: color_for_kind(&n.kind),
                    val: if n.attributes.contains_key("summarized") {
                        SUMMARIZED_NODE_VAL
                    } else {
                        NODE_VAL
                    },
                })
                .collect(),
            links: edges
                .iter()
                .zip(unique_edge_ids(edges))
                .map(|(e, id)| ForceGraphLink {
                    id,
                    source: e.source.clone(),
                    target: e.target.clone(),
                    label: edge_label(e),
                })
                .collect(),
        }
    }

    fn from_renderer_event(&self, event: &ForceGraphEvent) -> Option<InteractionEvent> {
        match event {
            ForceGraphEvent::NodeHover {
                node: Some(node), ..
            } => Some(InteractionEvent::HoverStart {
                node_id: node.clone(),
            }),
            ForceGraphEvent::NodeHover {
                node: None,
                previous: Some(prev),
            } => Some(InteractionEvent::HoverEnd {
                node_id: prev.clone(),
            }),
            ForceGraphEvent::NodeClick { node } => Some(InteractionEvent::Select {
                node_id: node.clone(),
            }),
            ForceGraphEvent::NodeRightClick {
                node,
                action: Some(action),
            } => Some(InteractionEvent::ContextAction {
                action_id: action.clone(),
                node_id: node.clone(),
            }),
            _ => None,
        }
    }

    fn layout_directive(&self) -> LayoutDirective {
        LayoutDirective::new("force")
            .with_option("d3AlphaDecay", json!(0.0228))
            .with_option("d3VelocityDecay", json!(0.4))
            .with_option("cooldownTicks", json!(100))
    }
}
