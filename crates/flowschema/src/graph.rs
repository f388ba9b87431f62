use crate::{is_valid_key, Edge, EdgeId, EdgeRegistry, GraphError, VariableSchema};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

pub type NodeId = String;

/// Node type whose config owns an editable variable schema.
pub const INPUT_NODE_TYPE: &str = "InputNode";

/// Node position in the visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A node in the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl FlowNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_type: node_type.into(),
            position: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn is_input(&self) -> bool {
        self.node_type == INPUT_NODE_TYPE
    }
}

/// Per-node metadata. Only schema mutations write `output_schema`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub output_schema: VariableSchema,
}

impl NodeConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output_schema: VariableSchema::new(),
        }
    }

    pub fn with_schema(mut self, schema: VariableSchema) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn has_fixed_output(&self) -> bool {
        self.output_schema.is_fixed()
    }
}

/// Graph container: nodes, their configs and the edge registry.
///
/// Topology changes live here; schema changes that must move edges along
/// with them are in the synchronizer (`sync.rs`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowGraph {
    pub(crate) nodes: Vec<FlowNode>,
    pub(crate) edges: EdgeRegistry,
    pub(crate) node_configs: BTreeMap<NodeId, NodeConfig>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from decoded parts, dropping whatever would break
    /// the graph invariants. Returns one diagnostic line per repair.
    pub fn from_parts(
        nodes: Vec<FlowNode>,
        edges: Vec<Edge>,
        mut node_configs: BTreeMap<NodeId, NodeConfig>,
    ) -> (Self, Vec<String>) {
        let mut diagnostics = Vec::new();
        let mut graph = FlowGraph::new();

        for node in nodes {
            if graph.contains_node(&node.id) {
                diagnostics.push(format!("dropped duplicate node {}", node.id));
                continue;
            }
            let mut config = node_configs.remove(&node.id).unwrap_or_else(|| {
                diagnostics.push(format!("node {} had no config, using defaults", node.id));
                NodeConfig::default()
            });
            for fix in config.output_schema.repair() {
                diagnostics.push(format!("node {}: {}", node.id, fix));
            }
            graph.node_configs.insert(node.id.clone(), config);
            graph.nodes.push(node);
        }

        for orphan in node_configs.keys() {
            diagnostics.push(format!("dropped config for unknown node {}", orphan));
        }

        for edge in edges {
            let id = edge.id.clone();
            if let Err(e) = graph.validate_edge(&edge) {
                diagnostics.push(format!("dropped edge {}: {}", id, e));
            } else if !graph.edges.insert(edge) {
                diagnostics.push(format!("dropped duplicate edge {}", id));
            }
        }

        (graph, diagnostics)
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn is_input_node(&self, id: &str) -> bool {
        self.node(id).is_some_and(FlowNode::is_input)
    }

    pub fn edges(&self) -> &EdgeRegistry {
        &self.edges
    }

    pub fn node_configs(&self) -> &BTreeMap<NodeId, NodeConfig> {
        &self.node_configs
    }

    pub fn config(&self, id: &str) -> Option<&NodeConfig> {
        self.node_configs.get(id)
    }

    /// Variable schema of an input node.
    pub fn schema(&self, id: &str) -> Option<&VariableSchema> {
        if !self.is_input_node(id) {
            return None;
        }
        self.node_configs.get(id).map(|c| &c.output_schema)
    }

    pub fn add_node(&mut self, node: FlowNode, config: NodeConfig) -> Result<(), GraphError> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        tracing::debug!("Adding node {} ({})", node.id, node.node_type);
        self.node_configs.insert(node.id.clone(), config);
        self.nodes.push(node);
        Ok(())
    }

    /// Removes the node, its config and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<Vec<Edge>, GraphError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        self.nodes.remove(index);
        self.node_configs.remove(id);
        let removed = self.edges.remove_touching(id);
        tracing::debug!("Removed node {} and {} edge(s)", id, removed.len());
        Ok(removed)
    }

    fn validate_edge(&self, edge: &Edge) -> Result<(), GraphError> {
        if !self.contains_node(&edge.source) {
            return Err(GraphError::NodeNotFound(edge.source.clone()));
        }
        if !self.contains_node(&edge.target) {
            return Err(GraphError::NodeNotFound(edge.target.clone()));
        }
        if edge.source == edge.target {
            return Err(GraphError::InvalidConnection(format!(
                "node {} cannot connect to itself",
                edge.source
            )));
        }
        if let (Some(schema), Some(key)) = (self.schema(&edge.source), edge.source_key.as_deref()) {
            if !schema.contains(key) {
                return Err(GraphError::InvalidConnection(format!(
                    "node {} has no variable '{}'",
                    edge.source, key
                )));
            }
        }
        Ok(())
    }

    /// Adds an edge. Keys on input nodes must already exist; connecting never
    /// creates a variable.
    pub fn connect(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        self.validate_edge(&edge)?;
        if self.edges.contains_endpoints(&edge) {
            return Err(GraphError::InvalidConnection(format!(
                "{} -> {} is already connected",
                edge.source, edge.target
            )));
        }
        let id = edge.id.clone();
        if !self.edges.insert(edge) {
            return Err(GraphError::InvalidConnection(format!("duplicate edge id {}", id)));
        }
        Ok(id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<Edge, GraphError> {
        self.edges
            .remove(edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))
    }

    pub fn set_title(&mut self, id: &str, title: impl Into<String>) -> Result<(), GraphError> {
        let config = self
            .node_configs
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        config.title = title.into();
        Ok(())
    }

    /// Lists every broken invariant. Empty for any graph built through this
    /// API.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for node in &self.nodes {
            let Some(schema) = self.schema(&node.id) else {
                continue;
            };
            let mut seen = HashSet::new();
            for key in schema.keys() {
                if !is_valid_key(key) {
                    violations.push(format!("node {}: invalid key '{}'", node.id, key));
                }
                if !seen.insert(key) {
                    violations.push(format!("node {}: duplicate key '{}'", node.id, key));
                }
            }
        }

        for edge in self.edges.iter() {
            if !self.contains_node(&edge.source) {
                violations.push(format!("edge {}: unknown source {}", edge.id, edge.source));
            }
            if !self.contains_node(&edge.target) {
                violations.push(format!("edge {}: unknown target {}", edge.id, edge.target));
            }
            if let (Some(schema), Some(key)) = (self.schema(&edge.source), &edge.source_key) {
                if !schema.contains(key) {
                    violations.push(format!(
                        "edge {}: source key '{}' missing from node {}",
                        edge.id, key, edge.source
                    ));
                }
            }
        }

        violations
    }
}
