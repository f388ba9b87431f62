//! Schema-edge synchronizer
//!
//! The only place that mutates a variable schema and the edge registry in
//! the same step. Each operation first computes the next schema (which may
//! be rejected), then applies it together with the edge changes it implies.
//! Nothing is written until every fallible check has passed, so a rejected
//! operation leaves both stores exactly as they were.

use crate::{
    EdgeId, FlowError, FlowGraph, GraphError, NodeId, SchemaChange, SchemaEdit, VariableSchema,
    VariableType,
};

/// What a committed schema operation did to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub node_id: NodeId,
    pub change: SchemaChange,
    pub edges_removed: Vec<EdgeId>,
    pub edges_retargeted: Vec<EdgeId>,
}

impl FlowGraph {
    fn input_schema(&self, node_id: &str) -> Result<&VariableSchema, GraphError> {
        let node = self
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        if !node.is_input() {
            return Err(GraphError::NotAnInputNode(node_id.to_string()));
        }
        self.node_configs
            .get(node_id)
            .map(|c| &c.output_schema)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))
    }

    fn commit_schema(&mut self, node_id: &str, edit: SchemaEdit) -> Result<SyncReport, FlowError> {
        let config = self
            .node_configs
            .get_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;

        let mut edges_removed = Vec::new();
        let mut edges_retargeted = Vec::new();
        match &edit.change {
            SchemaChange::Deleted { key } => {
                edges_removed = self
                    .edges
                    .remove_by_source_key(node_id, key)
                    .into_iter()
                    .map(|e| e.id)
                    .collect();
            }
            SchemaChange::Renamed { old, new } => {
                edges_retargeted = self.edges.retarget_source_key(node_id, old, new);
            }
            SchemaChange::Added { .. } | SchemaChange::Retyped { .. } => {}
        }
        config.output_schema = edit.schema;

        tracing::debug!(
            node_id,
            change = ?edit.change,
            removed = edges_removed.len(),
            retargeted = edges_retargeted.len(),
            "Committed schema change"
        );

        Ok(SyncReport {
            node_id: node_id.to_string(),
            change: edit.change,
            edges_removed,
            edges_retargeted,
        })
    }

    pub fn add_variable(
        &mut self,
        node_id: &str,
        raw_key: &str,
        value_type: VariableType,
    ) -> Result<SyncReport, FlowError> {
        let edit = self.input_schema(node_id)?.add_variable(raw_key, value_type)?;
        self.commit_schema(node_id, edit)
    }

    /// Deletes the variable and every edge reading it.
    pub fn delete_variable(&mut self, node_id: &str, key: &str) -> Result<SyncReport, FlowError> {
        let edit = self.input_schema(node_id)?.delete_variable(key)?;
        self.commit_schema(node_id, edit)
    }

    /// Renames the variable and retargets every edge reading it.
    pub fn rename_variable(
        &mut self,
        node_id: &str,
        old_key: &str,
        new_raw_key: &str,
    ) -> Result<SyncReport, FlowError> {
        let edit = self
            .input_schema(node_id)?
            .rename_variable(old_key, new_raw_key)?;
        self.commit_schema(node_id, edit)
    }

    pub fn set_variable_type(
        &mut self,
        node_id: &str,
        key: &str,
        value_type: VariableType,
    ) -> Result<SyncReport, FlowError> {
        let edit = self
            .input_schema(node_id)?
            .set_variable_type(key, value_type)?;
        self.commit_schema(node_id, edit)
    }
}
