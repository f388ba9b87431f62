use crate::EditTarget;
use flowschema::{Edge, EdgeId, NodeId, VariableType};

const MIN_WIDTH_PX: f64 = 300.0;
const MAX_WIDTH_PX: f64 = 600.0;
const PX_PER_CHAR: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRow {
    pub key: String,
    pub value_type: VariableType,
}

/// Display row for an edge arriving at a node, keyed by where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRow {
    pub edge_id: EdgeId,
    pub source: NodeId,
    pub target_handle: String,
}

/// Read-only projection of one node for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub node_id: NodeId,
    pub node_type: String,
    pub title: String,
    pub variables: Vec<VariableRow>,
    pub is_fixed: bool,
    pub collapsed: bool,
    /// Add/rename/delete affordances are shown
    pub editable: bool,
    /// Handles accept new connections
    pub connectable: bool,
    pub incoming: Vec<IncomingRow>,
    pub outgoing: Vec<Edge>,
    pub editing: Option<(EditTarget, String)>,
    pub preview_open: bool,
    pub width_px: u32,
}

fn longest<'a>(labels: impl Iterator<Item = &'a str>) -> f64 {
    labels.map(|l| l.chars().count()).max().unwrap_or(0) as f64
}

/// Width heuristic: longest incoming label plus longest variable name, or
/// two thirds of the title length, at 15px per character, clamped to
/// 300..=600px.
pub fn suggested_width<'a>(
    incoming_labels: impl Iterator<Item = &'a str>,
    variable_keys: impl Iterator<Item = &'a str>,
    title: &str,
) -> u32 {
    let label = (longest(incoming_labels) + longest(variable_keys))
        .max(title.chars().count() as f64 / 1.5);
    (label * PX_PER_CHAR).clamp(MIN_WIDTH_PX, MAX_WIDTH_PX) as u32
}
