//! One adapter per supported renderer, plus the headless engine.

pub mod cytoscape;
pub mod force_graph;
pub mod headless;

pub use cytoscape::{CytoscapeAdapter, CytoscapeLayout, CytoscapeModel};
pub use force_graph::{ForceGraphAdapter, ForceGraphModel};
pub use headless::{HeadlessEngine, HeadlessSurface};

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::adapter::{DEFAULT_NODE_COLOR, GraphModelAdapter};
    use meshdesk_core::graph::{GraphEdge, GraphNode};
    use meshdesk_core::types::EntityType;
    use proptest::prelude::*;

    fn arb_node() -> impl Strategy<Value = GraphNode> {
        (
            "[a-z0-9-]{1,16}",
            "[a-z]{3,12}",
            proptest::option::of("[A-Za-z ]{0,12}"),
        )
            .prop_map(|(id, kind, label)| {
                let node = GraphNode::new(id, kind);
                match label {
                    Some(l) => node.with_label(l),
                    None => node,
                }
            })
    }

    fn arb_edge() -> impl Strategy<Value = GraphEdge> {
        (
            "[a-z0-9]{1,6}",
            "[a-z0-9]{1,6}",
            proptest::option::of("e[0-9]{1,3}"),
        )
            .prop_map(|(s, t, id)| {
                let edge = GraphEdge::new(s, t);
                match id {
                    Some(id) => edge.with_id(id),
                    None => edge,
                }
            })
    }

    proptest! {
        /// Same input, structurally equal output, for both adapters.
        #[test]
        fn adapters_are_deterministic(
            nodes in proptest::collection::vec(arb_node(), 0..20),
            edges in proptest::collection::vec(arb_edge(), 0..30),
        ) {
            let cy = CytoscapeAdapter::default();
            prop_assert_eq!(cy.to_renderer_model(&nodes, &edges), cy.to_renderer_model(&nodes, &edges));
            prop_assert_eq!(
                ForceGraphAdapter.to_renderer_model(&nodes, &edges),
                ForceGraphAdapter.to_renderer_model(&nodes, &edges)
            );
        }

        /// Every node and edge is carried over; nothing is merged or dropped.
        #[test]
        fn adapters_preserve_cardinality(
            nodes in proptest::collection::vec(arb_node(), 0..20),
            edges in proptest::collection::vec(arb_edge(), 0..30),
        ) {
            let cy = CytoscapeAdapter::default().to_renderer_model(&nodes, &edges);
            prop_assert_eq!(cy.elements.nodes.len(), nodes.len());
            prop_assert_eq!(cy.elements.edges.len(), edges.len());
            let fg = ForceGraphAdapter.to_renderer_model(&nodes, &edges);
            prop_assert_eq!(fg.links.len(), edges.len());
        }

        /// Kinds outside the entity palette always get the same default color.
        #[test]
        fn unknown_kinds_share_default_color(kind in "[a-z]{3,12}") {
            prop_assume!(kind.parse::<EntityType>().is_err());
            let node = GraphNode::new("n1", kind);
            let cy = CytoscapeAdapter::default().to_renderer_model(std::slice::from_ref(&node), &[]);
            let fg = ForceGraphAdapter.to_renderer_model(&[node], &[]);
            prop_assert_eq!(cy.elements.nodes[0].data.color, DEFAULT_NODE_COLOR);
            prop_assert_eq!(fg.nodes[0].color, DEFAULT_NODE_COLOR);
        }
    }
}
