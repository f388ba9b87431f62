use crate::EditTarget;
use flowschema::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Shown whenever the sanitizer had to change a typed name.
pub const SANITIZE_NOTICE: &str =
    "Variable names cannot contain whitespace. Using underscores instead.";

/// Persisted user preference flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub has_seen_welcome: bool,
}

/// Side panel state; not persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    pub is_node_panel_expanded: bool,
}

/// An in-progress edit of a variable name. Nothing reaches the schema until
/// the session is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub node_id: NodeId,
    pub target: EditTarget,
    pub draft: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNotice {
    pub message: String,
    pub expires_at: Instant,
}

impl ActiveNotice {
    pub fn new(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            message: message.into(),
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Ephemeral UI slices. None of this is written to a snapshot.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub collapsed: HashSet<NodeId>,
    pub preview_open: Option<NodeId>,
    pub editing: Option<EditSession>,
    pub notice: Option<ActiveNotice>,
    pub panel: PanelState,
}

impl UiState {
    pub fn is_collapsed(&self, node_id: &str) -> bool {
        self.collapsed.contains(node_id)
    }

    /// Drop every reference to a node that no longer exists.
    pub(crate) fn forget_node(&mut self, node_id: &str) {
        self.collapsed.remove(node_id);
        if self.preview_open.as_deref() == Some(node_id) {
            self.preview_open = None;
        }
        if self
            .editing
            .as_ref()
            .is_some_and(|session| session.node_id == node_id)
        {
            self.editing = None;
        }
    }
}
