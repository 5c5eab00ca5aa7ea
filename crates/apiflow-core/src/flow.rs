use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::types::{Edge, Node, NodeKind, NodeResult};

/// Id of the source node every fresh flow starts with.
pub const START_NODE_ID: &str = "start-node";

/// Editor UI state stored next to a node's settings; never part of its config.
const UI_STATE_KEYS: [&str; 3] = ["response", "isLoading", "error"];

/// The graph a run operates on: nodes plus "target depends on source" edges.
///
/// This is also the import/export document format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flow {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

impl Flow {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// A fresh flow holding a single empty start node.
    pub fn reset() -> Self {
        let start = Node::source(START_NODE_ID, Value::Object(Map::new())).with_label("Start");
        Self::new(vec![start], vec![])
    }

    /// Parse an exported flow document.
    pub fn from_json(input: &str) -> Result<Self> {
        let mut flow: Flow =
            serde_json::from_str(input).map_err(|e| FlowError::InvalidFlow(e.to_string()))?;
        flow.check_unique_ids()?;
        for node in &mut flow.nodes {
            for key in UI_STATE_KEYS {
                node.config.remove(key);
            }
        }
        Ok(flow)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a flow document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the flow (including last results) to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(FlowError::InvalidFlow(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Snapshot of a node for template lookups.
    pub fn snapshot(&self, id: &str) -> Option<Value> {
        self.node(id).map(Node::snapshot)
    }

    /// Incoming edges of `target`, in declared order.
    pub fn incoming(&self, target: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.target == target).collect()
    }

    /// Replace a node's last result as a whole.
    pub fn set_result(&mut self, id: &str, result: Option<NodeResult>) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| FlowError::NodeNotFound(id.to_string()))?;
        node.last_result = result;
        Ok(())
    }

    /// Add a node of `kind` with a generated `<kind>-<8 hex>` id. Returns the id.
    pub fn add_node(&mut self, kind: NodeKind, config: Map<String, Value>) -> String {
        let id = format!("{}-{}", kind, short_id());
        let mut node = Node::new(id.clone(), kind);
        node.config = config;
        self.nodes.push(node);
        id
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Some(self.nodes.remove(index))
    }

    /// Copy a node's configuration under a fresh id, without its result.
    pub fn duplicate_node(&mut self, id: &str) -> Option<String> {
        let original = self.node(id)?;
        let new_id = format!("{}-{}", original.kind, short_id());
        let mut copy = original.clone();
        copy.id = new_id.clone();
        copy.last_result = None;
        self.nodes.push(copy);
        Some(new_id)
    }

    /// Connect `source → target`. An identical existing connection is reused.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<String> {
        for id in [source, target] {
            if self.node(id).is_none() {
                return Err(FlowError::NodeNotFound(id.to_string()));
            }
        }
        if let Some(existing) = self
            .edges
            .iter()
            .find(|e| e.source == source && e.target == target)
        {
            return Ok(existing.id.clone());
        }
        let id = format!("edge-{}-{}-{}", source, target, short_id());
        self.edges.push(Edge::new(id.clone(), source, target));
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let index = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(index))
    }
}
