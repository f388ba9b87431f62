use crate::NodeTypeDescriptor;
use flowschema::{EdgeId, NodeId, Position, VariableType};
use serde::{Deserialize, Serialize};

/// A variable supplied from outside when creating a fixed input node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub key: String,
    #[serde(default)]
    pub value_type: VariableType,
}

/// Which field an edit session is changing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EditTarget {
    NewVariable,
    Existing { key: String },
}

/// Discrete user intents emitted by the presentation layer.
///
/// Intents are applied strictly in dispatch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Intent {
    RegisterNodeType {
        descriptor: NodeTypeDescriptor,
    },
    AddNode {
        #[serde(default)]
        id: Option<NodeId>,
        node_type: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        fixed_schema: Option<Vec<VariableSpec>>,
    },
    RemoveNode {
        node_id: NodeId,
    },
    Connect {
        source: NodeId,
        #[serde(default)]
        source_key: Option<String>,
        target: NodeId,
        #[serde(default)]
        target_handle: String,
    },
    Disconnect {
        edge_id: EdgeId,
    },
    SetTitle {
        node_id: NodeId,
        title: String,
    },
    AddVariable {
        node_id: NodeId,
        raw_key: String,
        #[serde(default)]
        value_type: VariableType,
    },
    DeleteVariable {
        node_id: NodeId,
        key: String,
    },
    RenameVariable {
        node_id: NodeId,
        old_key: String,
        new_raw_key: String,
    },
    SetVariableType {
        node_id: NodeId,
        key: String,
        value_type: VariableType,
    },
    SetCollapsed {
        node_id: NodeId,
        collapsed: bool,
    },
    OpenOutputPreview {
        node_id: NodeId,
    },
    CloseOutputPreview,
    BeginEdit {
        node_id: NodeId,
        target: EditTarget,
    },
    UpdateDraft {
        text: String,
    },
    CommitEdit,
    CancelEdit,
    DismissNotice,
    SetPreference {
        has_seen_welcome: bool,
    },
    SetNodePanelExpanded {
        expanded: bool,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::RegisterNodeType { .. } => "register_node_type",
            Intent::AddNode { .. } => "add_node",
            Intent::RemoveNode { .. } => "remove_node",
            Intent::Connect { .. } => "connect",
            Intent::Disconnect { .. } => "disconnect",
            Intent::SetTitle { .. } => "set_title",
            Intent::AddVariable { .. } => "add_variable",
            Intent::DeleteVariable { .. } => "delete_variable",
            Intent::RenameVariable { .. } => "rename_variable",
            Intent::SetVariableType { .. } => "set_variable_type",
            Intent::SetCollapsed { .. } => "set_collapsed",
            Intent::OpenOutputPreview { .. } => "open_output_preview",
            Intent::CloseOutputPreview => "close_output_preview",
            Intent::BeginEdit { .. } => "begin_edit",
            Intent::UpdateDraft { .. } => "update_draft",
            Intent::CommitEdit => "commit_edit",
            Intent::CancelEdit => "cancel_edit",
            Intent::DismissNotice => "dismiss_notice",
            Intent::SetPreference { .. } => "set_preference",
            Intent::SetNodePanelExpanded { .. } => "set_node_panel_expanded",
        }
    }

    /// Node the intent is addressed to, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Intent::AddNode { id, .. } => id.as_deref(),
            Intent::RemoveNode { node_id }
            | Intent::SetTitle { node_id, .. }
            | Intent::AddVariable { node_id, .. }
            | Intent::DeleteVariable { node_id, .. }
            | Intent::RenameVariable { node_id, .. }
            | Intent::SetVariableType { node_id, .. }
            | Intent::SetCollapsed { node_id, .. }
            | Intent::OpenOutputPreview { node_id }
            | Intent::BeginEdit { node_id, .. } => Some(node_id.as_str()),
            Intent::Connect { source, .. } => Some(source.as_str()),
            _ => None,
        }
    }

    /// Whether the intent writes a graph or schema slice.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Intent::RegisterNodeType { .. }
                | Intent::AddNode { .. }
                | Intent::RemoveNode { .. }
                | Intent::Connect { .. }
                | Intent::Disconnect { .. }
                | Intent::SetTitle { .. }
                | Intent::AddVariable { .. }
                | Intent::DeleteVariable { .. }
                | Intent::RenameVariable { .. }
                | Intent::SetVariableType { .. }
        )
    }
}

/// Result of dispatching an intent. Rejections are silent: they carry a
/// reason for logs and tests, never an error for the caller to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Committed,
    /// Nothing to do: fixed schema, read-only editor, unchanged value.
    NoOp,
    Rejected { reason: String },
}

impl IntentOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, IntentOutcome::Committed)
    }

    pub fn rejected(reason: impl ToString) -> Self {
        IntentOutcome::Rejected {
            reason: reason.to_string(),
        }
    }
}
