//! Generic graph model ⇄ renderer-native model.
//!
//! One `GraphModelAdapter` per concrete renderer, chosen when the view is
//! composed. Adapters are pure: the same nodes and edges always produce a
//! structurally equal native model.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use meshdesk_core::graph::{GraphEdge, GraphNode};
use meshdesk_core::types::EntityType;

/// Translate between the generic graph model and one renderer's schema.
pub trait GraphModelAdapter: Send + Sync {
    /// Renderer-native node/edge/style structure.
    type Model: Clone + fmt::Debug + PartialEq + Serialize + Send + 'static;
    /// Raw interaction callback payload emitted by the renderer.
    type NativeEvent: 'static;

    fn name(&self) -> &'static str;

    fn to_renderer_model(&self, nodes: &[GraphNode], edges: &[GraphEdge]) -> Self::Model;

    /// `None` for events the adapter does not understand.
    fn from_renderer_event(&self, event: &Self::NativeEvent) -> Option<InteractionEvent>;

    fn layout_directive(&self) -> LayoutDirective;
}

/// Renderer-independent user interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InteractionEvent {
    HoverStart { node_id: String },
    HoverEnd { node_id: String },
    Select { node_id: String },
    ContextAction { action_id: String, node_id: String },
}

impl InteractionEvent {
    pub fn node_id(&self) -> &str {
        match self {
            Self::HoverStart { node_id }
            | Self::HoverEnd { node_id }
            | Self::Select { node_id }
            | Self::ContextAction { node_id, .. } => node_id,
        }
    }
}

/// Layout algorithm name plus its engine-specific options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDirective {
    pub name: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl LayoutDirective {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

// ─── Shared Mapping Rules ────────────────────────────────────────────

/// Color for node kinds outside the entity palette.
pub const DEFAULT_NODE_COLOR: &str = "#9ca3af";

/// Characters of the id shown when a node has no label.
pub const FALLBACK_LABEL_CHARS: usize = 8;

pub fn color_for_entity(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Users => "#3b82f6",
        EntityType::Cards => "#f59e0b",
        EntityType::Decks => "#10b981",
        EntityType::Games => "#8b5cf6",
        EntityType::Actors => "#ec4899",
        EntityType::Agreements => "#14b8a6",
        EntityType::Chat => "#6366f1",
        EntityType::Positions => "#f97316",
        EntityType::Values => "#84cc16",
        EntityType::Capabilities => "#06b6d4",
    }
}

pub fn color_for_kind(kind: &str) -> &'static str {
    kind.parse::<EntityType>()
        .map_or(DEFAULT_NODE_COLOR, color_for_entity)
}

pub fn node_label(node: &GraphNode) -> String {
    match &node.label {
        Some(label) => label.clone(),
        None => node.id.chars().take(FALLBACK_LABEL_CHARS).collect(),
    }
}

pub fn edge_id(edge: &GraphEdge) -> String {
    edge.id
        .clone()
        .unwrap_or_else(|| format!("edge-{}-{}", edge.source, edge.target))
}

/// Element ids for `edges`, in order. The first edge with a given id keeps
/// it; later repeats get `-1`, `-2`, ... appended so ids stay unique.
pub fn unique_edge_ids(edges: &[GraphEdge]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(edges.len());
    edges
        .iter()
        .map(|edge| {
            let base = edge_id(edge);
            let mut id = base.clone();
            let mut repeat = 0;
            while used.contains(&id) {
                repeat += 1;
                id = format!("{base}-{repeat}");
            }
            used.insert(id.clone());
            id
        })
        .collect()
}

pub fn edge_label(edge: &GraphEdge) -> String {
    edge.label.clone().unwrap_or_default()
}
