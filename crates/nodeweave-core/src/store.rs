//! Repository seam between the editor and whatever owns the canonical
//! workflow graph.
//!
//! The editor only needs to list nodes and edges, fetch one node, and
//! shallow-merge a partial data payload into a stored node. [`WorkflowGraph`]
//! implements the seam in memory.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Edge, Node, NodeData, NodeMetadata, Position, WorkflowGraph};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Node {0} not found")]
    NodeNotFound(String),

    #[error("Failed to export node: {0}")]
    Export(#[from] serde_json::Error),
}

/// Partial node data. `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDataPatch {
    pub label: Option<String>,
    pub content: Option<String>,
    pub selected_sources: Option<Vec<String>>,
    pub metadata: Option<NodeMetadata>,
}

impl NodeData {
    /// Shallow merge: each present patch field replaces the whole field.
    pub fn apply_patch(&mut self, patch: NodeDataPatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(content) = patch.content {
            self.content = Some(content);
        }
        if let Some(sources) = patch.selected_sources {
            self.selected_sources = Some(sources);
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = Some(metadata);
        }
    }
}

pub trait NodeRepository {
    fn list_nodes(&self) -> Vec<Node>;

    fn list_edges(&self) -> Vec<Edge>;

    fn get_node(&self, id: &str) -> Option<Node>;

    /// Shallow-merge `patch` into the stored node's data.
    fn update_node(&mut self, id: &str, patch: NodeDataPatch) -> Result<(), StoreError>;
}

/// Node-level actions offered from the editor's settings menu.
pub trait NodeActions: NodeRepository {
    /// Copies a node under a fresh id, shifted by `offset`. Edges are not copied.
    fn duplicate_node(&mut self, id: &str, offset: Position) -> Result<String, StoreError>;

    fn delete_node(&mut self, id: &str) -> Result<Node, StoreError>;

    /// Pretty-printed JSON of a single node.
    fn export_node(&self, id: &str) -> Result<String, StoreError> {
        let node = self
            .get_node(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
        Ok(serde_json::to_string_pretty(&node)?)
    }
}

impl NodeRepository for WorkflowGraph {
    fn list_nodes(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    fn list_edges(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    fn get_node(&self, id: &str) -> Option<Node> {
        self.find_node(id).cloned()
    }

    fn update_node(&mut self, id: &str, patch: NodeDataPatch) -> Result<(), StoreError> {
        let node = self
            .find_node_mut(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
        node.data.apply_patch(patch);
        debug!("Updated node {}", id);
        Ok(())
    }
}

impl NodeActions for WorkflowGraph {
    fn duplicate_node(&mut self, id: &str, offset: Position) -> Result<String, StoreError> {
        let source = self
            .find_node(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
        let mut copy = source.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.position = source.position.offset(offset);
        copy.data.label = format!("{} (copy)", source.data.label);
        let new_id = copy.id.clone();
        self.nodes.push(copy);
        info!("Duplicated node {} as {}", id, new_id);
        Ok(new_id)
    }

    fn delete_node(&mut self, id: &str) -> Result<Node, StoreError> {
        let node = self
            .remove_node(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;
        info!("Deleted node {}", id);
        Ok(node)
    }
}
