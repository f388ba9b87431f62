//! Core data model for the workflow editor state layer
//!
//! This crate owns the pieces every other component agrees on: the key
//! sanitizer, per-node variable schemas, the edge registry, the graph
//! container they live in and the synchronizer that keeps schema and edges
//! consistent. It performs no I/O.

mod edge;
mod error;
pub mod events;
mod graph;
pub mod sanitize;
mod schema;
mod sync;
mod value_type;

pub use edge::{Edge, EdgeId, EdgeRegistry};
pub use error::{FlowError, GraphError, PersistenceError, SchemaError};
pub use events::*;
pub use graph::{FlowGraph, FlowNode, NodeConfig, NodeId, Position, INPUT_NODE_TYPE};
pub use sanitize::{is_valid_key, sanitize, unique_key, SanitizedKey, PLACEHOLDER};
pub use schema::{SchemaChange, SchemaEdit, VariableSchema};
pub use sync::SyncReport;
pub use value_type::VariableType;

/// Result type for editor state operations
pub type Result<T> = std::result::Result<T, FlowError>;
