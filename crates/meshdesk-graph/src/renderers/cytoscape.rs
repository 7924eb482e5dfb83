use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use meshdesk_core::graph::{GraphEdge, GraphNode};
use meshdesk_core::types::EntityType;

use crate::adapter::{
    DEFAULT_NODE_COLOR, GraphModelAdapter, InteractionEvent, LayoutDirective, color_for_entity,
    color_for_kind, edge_label, node_label, unique_edge_ids,
};

/// Layout algorithms offered for the element-model renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CytoscapeLayout {
    /// Force-directed.
    #[default]
    Cose,
    /// Hierarchical.
    Breadthfirst,
}

/// Adapter for element/style/layout renderers (Cytoscape contract).
#[derive(Debug, Clone, Default)]
pub struct CytoscapeAdapter {
    layout: CytoscapeLayout,
}

impl CytoscapeAdapter {
    pub fn new(layout: CytoscapeLayout) -> Self {
        Self { layout }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CytoscapeModel {
    pub elements: CytoscapeElements,
    pub style: Vec<CytoscapeStyle>,
    pub layout: LayoutDirective,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CytoscapeElements {
    pub nodes: Vec<CytoscapeNode>,
    pub edges: Vec<CytoscapeEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CytoscapeNode {
    pub data: CytoscapeNodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CytoscapeNodeData {
    pub id: String,
    pub label: String,
    pub kind: String,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CytoscapeEdge {
    pub data: CytoscapeEdgeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CytoscapeEdgeData {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CytoscapeStyle {
    pub selector: String,
    pub style: Map<String, Value>,
}

/// Raw callback payload: `event_type` is the engine's event name and
/// `target` the id of the element it fired on, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CytoscapeEvent {
    pub event_type: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub target_is_edge: bool,
    /// Menu command id for context-menu events.
    #[serde(default)]
    pub command: Option<String>,
}

impl CytoscapeEvent {
    pub fn on_node(event_type: &str, node_id: &str) -> Self {
        Self {
            event_type: event_type.to_owned(),
            target: Some(node_id.to_owned()),
            target_is_edge: false,
            command: None,
        }
    }
}

fn style(selector: &str, rules: Value) -> CytoscapeStyle {
    let style = match rules {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    CytoscapeStyle {
        selector: selector.to_owned(),
        style,
    }
}

fn stylesheet() -> Vec<CytoscapeStyle> {
    let mut sheet = vec![
        style(
            "node",
            json!({
                "label": "data(label)",
                "background-color": DEFAULT_NODE_COLOR,
                "font-size": 10,
                "text-valign": "bottom",
            }),
        ),
        style(
            "edge",
            json!({
                "label": "data(label)",
                "width": 1.5,
                "curve-style": "bezier",
                "target-arrow-shape": "triangle",
                "font-size": 8,
            }),
        ),
    ];
    sheet.extend(EntityType::ALL.iter().map(|t| {
        style(
            &format!("node[kind = \"{t}\"]"),
            json!({ "background-color": color_for_entity(*t) }),
        )
    }));
    sheet.push(style(
        "node:selected",
        json!({ "border-width": 3, "border-color": "#111827" }),
    ));
    sheet
}

impl GraphModelAdapter for CytoscapeAdapter {
    type Model = CytoscapeModel;
    type NativeEvent = CytoscapeEvent;

    fn name(&self) -> &'static str {
        "cytoscape"
    }

    fn to_renderer_model(&self, nodes: &[GraphNode], edges: &[GraphEdge]) -> CytoscapeModel {
        let nodes = nodes
            .iter()
            .map(|n| CytoscapeNode {
                data: CytoscapeNodeData {
                    id: n.id.clone(),
                    label: node_label(n),
                    kind: n.kind.clone(),
                    color: color_for_kind(&n.kind),
                    attributes: n.attributes.clone(),
                },
            })
            .collect();
        let edges = edges
            .iter()
            .zip(unique_edge_ids(edges))
            .map(|(e, id)| CytoscapeEdge {
                data: CytoscapeEdgeData {
                    id,
                    source: e.source.clone(),
                    target: e.target.clone(),
                    label: edge_label(e),
                },
            })
            .collect();
        CytoscapeModel {
            elements: CytoscapeElements { nodes, edges },
            style: stylesheet(),
            layout: self.layout_directive(),
        }
    }

    fn from_renderer_event(&self, event: &CytoscapeEvent) -> Option<InteractionEvent> {
        if event.target_is_edge {
            return None;
        }
        let node_id = event.target.clone()?;
        match event.event_type.as_str() {
            "mouseover" => Some(InteractionEvent::HoverStart { node_id }),
            "mouseout" => Some(InteractionEvent::HoverEnd { node_id }),
            "tap" | "select" => Some(InteractionEvent::Select { node_id }),
            "cxtcommand" => event.command.clone().map(|action_id| {
                InteractionEvent::ContextAction { action_id, node_id }
            }),
            _ => None,
        }
    }

    fn layout_directive(&self) -> LayoutDirective {
        match self.layout {
            CytoscapeLayout::Cose => LayoutDirective::new("cose")
                .with_option("animate", json!(false))
                .with_option("nodeRepulsion", json!(8_000))
                .with_option("idealEdgeLength", json!(80))
                .with_option("fit", json!(false)),
            CytoscapeLayout::Breadthfirst => LayoutDirective::new("breadthfirst")
                .with_option("directed", json!(true))
                .with_option("spacingFactor", json!(1.25))
                .with_option("fit", json!(false)),
        }
    }
}
