use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejections produced by variable schema mutations.
///
/// None of these are surfaced to the user; the store logs them and leaves
/// the schema untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Schema is fixed and cannot be modified")]
    FixedSchema,

    #[error("Variable name is empty")]
    EmptyKey,

    #[error("Variable '{0}' already exists")]
    DuplicateKey(String),

    #[error("Cannot rename '{old}' to '{new}': a variable with that name already exists")]
    KeyCollision { old: String, new: String },

    #[error("Variable '{0}' would be renamed to itself")]
    UnchangedKey(String),

    #[error("Variable not found: {0}")]
    KeyNotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node already exists: {0}")]
    DuplicateNode(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node {0} is not an input node")]
    NotAnInputNode(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
