use flowschema::INPUT_NODE_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generic processing node registered alongside the input node.
pub const PASSTHROUGH_NODE_TYPE: &str = "Passthrough";

/// Metadata about a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDescriptor {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<PortDefinition>,
    #[serde(default)]
    pub outputs: Vec<PortDefinition>,
}

fn default_category() -> String {
    "general".to_string()
}

impl NodeTypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: default_category(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, port: PortDefinition) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortDefinition) -> Self {
        self.outputs.push(port);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl PortDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

/// Catalog of node types the editor can place.
///
/// Persisted as a list of descriptors ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<NodeTypeDescriptor>", into = "Vec<NodeTypeDescriptor>")]
pub struct NodeTypeRegistry {
    types: BTreeMap<String, NodeTypeDescriptor>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the input node and the passthrough node.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            NodeTypeDescriptor::new(INPUT_NODE_TYPE)
                .with_category("input")
                .with_description("Exposes user-defined workflow input variables"),
        );
        registry.register(
            NodeTypeDescriptor::new(PASSTHROUGH_NODE_TYPE)
                .with_category("general")
                .with_description("Forwards its inputs unchanged")
                .with_input(PortDefinition::new("value", "Any value", false))
                .with_output(PortDefinition::new("value", "The same value", false)),
        );
        registry
    }

    /// Register a node type, replacing any descriptor with the same name
    pub fn register(&mut self, descriptor: NodeTypeDescriptor) {
        tracing::debug!("Registering node type: {}", descriptor.name);
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.types.contains_key(node_type)
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeTypeDescriptor> {
        self.types.get(node_type)
    }

    /// Get all registered node types
    pub fn list_node_types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &NodeTypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl From<Vec<NodeTypeDescriptor>> for NodeTypeRegistry {
    fn from(descriptors: Vec<NodeTypeDescriptor>) -> Self {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor);
        }
        registry
    }
}

impl From<NodeTypeRegistry> for Vec<NodeTypeDescriptor> {
    fn from(registry: NodeTypeRegistry) -> Self {
        registry.types.into_values().collect()
    }
}
