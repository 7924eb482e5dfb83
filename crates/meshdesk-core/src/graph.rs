//! Renderer-agnostic graph model and relationship derivation.
//!
//! `GraphNode` / `GraphEdge` are the generic input every renderer adapter
//! consumes. [`derive_graph`] builds them from a registry snapshot by
//! treating any field that names another observed record as an edge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{EntityRecord, ProjectedValue, RegistrySnapshot};

/// Field names tried, in order, when picking a node label.
const LABEL_FIELDS: [&str; 5] = ["name", "title", "email", "alias", "displayName"];

/// Key a store uses for an embedded reference object (`{"#": "<id>"}`).
const REFERENCE_KEY: &str = "#";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            kind: kind.into(),
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            label: None,
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Generic `{nodes, edges}` model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphModel {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphModel {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ─── Derivation ───────────────────────────────────────────────────────

/// Build the relationship graph of every projected entry in `snapshot`.
///
/// One node per id (the first entity type in declaration order wins when
/// two collections share an id). An edge is emitted for each field whose
/// string value, array element, or `{"#": id}` reference names another
/// node; its label is the field name. Edge ids are left unset.
pub fn derive_graph(snapshot: &RegistrySnapshot) -> GraphModel {
    let mut nodes: BTreeMap<&str, GraphNode> = BTreeMap::new();
    for (entity_type, projection) in &snapshot.projections {
        for (id, value) in projection {
            if nodes.contains_key(id.as_str()) {
                continue;
            }
            let node = match value {
                ProjectedValue::Record(record) => record_node(record),
                ProjectedValue::Summary(_) => GraphNode::new(id.clone(), entity_type.as_str())
                    .with_attribute("summarized", Value::Bool(true)),
            };
            nodes.insert(id.as_str(), node);
        }
    }

    let mut edges = Vec::new();
    for record in snapshot.records() {
        // Skip records shadowed by a same-id record of an earlier type.
        if nodes.get(record.id.as_str()).map(|n| n.kind.as_str()) != Some(record.entity_type.as_str()) {
            continue;
        }
        for (field, value) in &record.fields {
            for target in referenced_ids(value) {
                if target != record.id && nodes.contains_key(target) {
                    edges.push(GraphEdge::new(record.id.clone(), target).with_label(field.clone()));
                }
            }
        }
    }

    GraphModel {
        nodes: nodes.into_values().collect(),
        edges,
    }
}

fn record_node(record: &EntityRecord) -> GraphNode {
    let mut node = GraphNode::new(record.id.clone(), record.entity_type.as_str());
    node.label = LABEL_FIELDS
        .iter()
        .find_map(|f| record.field_str(f).filter(|s| !s.is_empty()))
        .map(str::to_owned);
    node
}

fn referenced_ids(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().flat_map(referenced_ids).collect(),
        Value::Object(map) => map
            .get(REFERENCE_KEY)
            .and_then(Value::as_str)
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityType, ProjectionSnapshot};
    use serde_json::json;

    fn snapshot(entries: &[(EntityType, &str, Value)]) -> RegistrySnapshot {
        let mut snap = RegistrySnapshot::default();
        for (t, id, v) in entries {
            snap.projections
                .entry(*t)
                .or_insert_with(ProjectionSnapshot::new)
                .insert((*id).to_owned(), ProjectedValue::project(*t, id, v, 1_000));
        }
        snap
    }

    #[test]
    fn empty_snapshot_gives_empty_graph() {
        let g = derive_graph(&RegistrySnapshot::default());
        assert!(g.is_empty());
        assert!(g.edges.is_empty());
    }

    #[test]
    fn nodes_carry_kind_and_label() {
        let g = derive_graph(&snapshot(&[
            (EntityType::Users, "u1", json!({"email": "a@x.com"})),
            (EntityType::Cards, "c1", json!({"title": "Ace", "email": "ignored"})),
            (EntityType::Decks, "d1", json!({"size": 3})),
        ]));
        assert_eq!(g.nodes.len(), 3);
        let by_id: BTreeMap<_, _> = g.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        assert_eq!(by_id["u1"].kind, "users");
        assert_eq!(by_id["u1"].label.as_deref(), Some("a@x.com"));
        assert_eq!(by_id["c1"].label.as_deref(), Some("Ace"));
        assert_eq!(by_id["d1"].label, None);
    }

    #[test]
    fn empty_label_field_falls_through_to_next() {
        let g = derive_graph(&snapshot(&[(
            EntityType::Cards,
            "c1",
            json!({"name": "", "title": "Ace"}),
        )]));
        assert_eq!(g.nodes[0].label.as_deref(), Some("Ace"));
    }

    #[test]
    fn string_array_and_reference_fields_become_edges() {
        let g = derive_graph(&snapshot(&[
            (EntityType::Users, "u1", json!({"name": "Ann"})),
            (EntityType::Cards, "c1", json!({"owner": "u1"})),
            (EntityType::Cards, "c2", json!({"owner": {"#": "u1"}})),
            (EntityType::Decks, "d1", json!({"cards": ["c1", "c2", "missing"]})),
        ]));
        let pairs: Vec<(&str, &str, Option<&str>)> = g
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.label.as_deref()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("c1", "u1", Some("owner")),
                ("c2", "u1", Some("owner")),
                ("d1", "c1", Some("cards")),
                ("d1", "c2", Some("cards")),
            ]
        );
        assert!(g.edges.iter().all(|e| e.id.is_none()));
    }

    #[test]
    fn repeated_references_are_kept() {
        let g = derive_graph(&snapshot(&[
            (EntityType::Actors, "a1", json!({})),
            (EntityType::Agreements, "g1", json!({"from": "a1", "to": "a1"})),
        ]));
        assert_eq!(g.edges.len(), 2);
    }

    #[test]
    fn self_references_are_ignored() {
        let g = derive_graph(&snapshot(&[(EntityType::Games, "g1", json!({"parent": "g1"}))]));
        assert!(g.edges.is_empty());
    }

    #[test]
    fn summarized_entries_become_bare_nodes() {
        let mut snap = snapshot(&[(EntityType::Users, "u1", json!({"name": "Ann"}))]);
        snap.projections.entry(EntityType::Chat).or_default().insert(
            "m1".into(),
            ProjectedValue::project(EntityType::Chat, "m1", &json!({"text": "x".repeat(2_000), "author": "u1"}), 1_000),
        );
        let g = derive_graph(&snap);
        let m1 = g.nodes.iter().find(|n| n.id == "m1").unwrap();
        assert_eq!(m1.kind, "chat");
        assert_eq!(m1.attributes["summarized"], json!(true));
        assert!(g.edges.is_empty());
    }

    #[test]
    fn derivation_is_deterministic() {
        let snap = snapshot(&[
            (EntityType::Users, "u2", json!({"friend": "u1"})),
            (EntityType::Users, "u1", json!({"friend": "u2"})),
        ]);
        assert_eq!(derive_graph(&snap), derive_graph(&snap));
    }

    #[test]
    fn graph_edge_builder() {
        let e = GraphEdge::new("a", "b").with_id("e1").with_label("rel");
        assert_eq!(e.id.as_deref(), Some("e1"));
        assert_eq!(e.label.as_deref(), Some("rel"));
        let v = serde_json::to_value(GraphEdge::new("a", "b")).unwrap();
        assert_eq!(v, json!({"source": "a", "target": "b"}));
    }
}
