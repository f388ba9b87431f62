use crate::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EdgeId = String;

/// Directed reference from a node output to another node's input handle.
///
/// `source_key` names a variable of the source node's schema. `None` means
/// the node-level output handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    pub target: NodeId,
    #[serde(default)]
    pub target_handle: String,
}

impl Edge {
    pub fn new(
        source: impl Into<NodeId>,
        source_key: Option<String>,
        target: impl Into<NodeId>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            source_key,
            target: target.into(),
            target_handle: target_handle.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether this edge reads `key` from node `node_id`.
    pub fn reads_key(&self, node_id: &str, key: &str) -> bool {
        self.source == node_id && self.source_key.as_deref() == Some(key)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// Same source, key, target and handle; ids are ignored.
    pub fn same_endpoints(&self, other: &Edge) -> bool {
        self.source == other.source
            && self.source_key == other.source_key
            && self.target == other.target
            && self.target_handle == other.target_handle
    }
}

/// The set of graph edges, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeRegistry {
    edges: Vec<Edge>,
}

impl EdgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_endpoints(&self, edge: &Edge) -> bool {
        self.edges.iter().any(|e| e.same_endpoints(edge))
    }

    /// Inserts unless the id or the endpoints are already present.
    pub fn insert(&mut self, edge: Edge) -> bool {
        if self.get(&edge.id).is_some() || self.contains_endpoints(&edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Edge> {
        let index = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(index))
    }

    fn drain_where(&mut self, mut pred: impl FnMut(&Edge) -> bool) -> Vec<Edge> {
        let mut removed = Vec::new();
        self.edges.retain(|e| {
            if pred(e) {
                removed.push(e.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Removes every edge that starts or ends at `node_id`.
    pub fn remove_touching(&mut self, node_id: &str) -> Vec<Edge> {
        self.drain_where(|e| e.touches(node_id))
    }

    pub fn remove_by_source_key(&mut self, node_id: &str, key: &str) -> Vec<Edge> {
        self.drain_where(|e| e.reads_key(node_id, key))
    }

    /// Points every edge reading `old` from `node_id` at `new` instead.
    /// Returns the ids of the edges that changed.
    pub fn retarget_source_key(&mut self, node_id: &str, old: &str, new: &str) -> Vec<EdgeId> {
        let mut changed = Vec::new();
        for edge in self.edges.iter_mut().filter(|e| e.reads_key(node_id, old)) {
            edge.source_key = Some(new.to_string());
            changed.push(edge.id.clone());
        }
        changed
    }

    pub fn incoming<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == target)
    }

    pub fn outgoing<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == source)
    }
}

impl FromIterator<Edge> for EdgeRegistry {
    fn from_iter<I: IntoIterator<Item = Edge>>(iter: I) -> Self {
        let mut registry = EdgeRegistry::new();
        for edge in iter {
            registry.insert(edge);
        }
        registry
    }
}
