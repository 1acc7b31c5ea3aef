use nodeweave_core::{Edge, Node};
use serde::Serialize;
use std::collections::HashMap;

/// A node feeding into the node being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct SourceNode {
    pub id: String,
    pub label: String,
}

/// Label shown for a source id that has no matching node.
pub fn fallback_label(id: &str) -> String {
    format!("Node {id}")
}

/// Upstream connections of `target`: one entry per edge pointing at it, in
/// edge order. Duplicate edges yield duplicate entries.
pub fn resolve_sources(edges: &[Edge], nodes: &[Node], target: Option<&str>) -> Vec<SourceNode> {
    let Some(target) = target else {
        return Vec::new();
    };

    let labels: HashMap<&str, &str> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.data.label.as_str()))
        .collect();

    edges
        .iter()
        .filter(|e| e.target == target)
        .map(|e| SourceNode {
            id: e.source.clone(),
            label: labels
                .get(e.source.as_str())
                .map(|label| label.to_string())
                .unwrap_or_else(|| fallback_label(&e.source)),
        })
        .collect()
}
