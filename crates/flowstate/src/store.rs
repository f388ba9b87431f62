use crate::persist::{restore, PersistedState, Persister, PersisterHandle, Restored, SnapshotStorage};
use crate::ui::{ActiveNotice, EditSession, UiState, UserPreferences, SANITIZE_NOTICE};
use crate::view::{suggested_width, IncomingRow, NodeView, VariableRow};
use crate::{EditTarget, Intent, IntentOutcome, NodeTypeRegistry, StoreConfig, VariableSpec};
use flowschema::{
    sanitize, Edge, EventBus, FlowError, FlowGraph, FlowNode, GraphError, NodeConfig, NodeId,
    Position, SchemaError, StateEvent, SyncReport, VariableSchema, VariableType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// What applying one intent changed.
struct Effect {
    outcome: IntentOutcome,
    /// A whitelisted slice changed and a snapshot should be scheduled
    persist: bool,
    /// Only ephemeral UI state changed
    ui_changed: bool,
}

impl Effect {
    fn persisted() -> Self {
        Self {
            outcome: IntentOutcome::Committed,
            persist: true,
            ui_changed: false,
        }
    }

    fn ui() -> Self {
        Self {
            outcome: IntentOutcome::Committed,
            persist: false,
            ui_changed: true,
        }
    }

    fn noop() -> Self {
        Self {
            outcome: IntentOutcome::NoOp,
            persist: false,
            ui_changed: false,
        }
    }

    fn rejected(reason: impl ToString) -> Self {
        Self {
            outcome: IntentOutcome::rejected(reason),
            persist: false,
            ui_changed: false,
        }
    }

    fn from_graph(result: Result<(), GraphError>) -> Self {
        match result {
            Ok(()) => Self::persisted(),
            Err(e) => Self::rejected(e),
        }
    }

    /// Fixed schemas, blank names, duplicates and renames to the same name
    /// are silent no-ops; everything else is a rejection.
    fn from_sync(result: Result<SyncReport, FlowError>) -> Self {
        match result {
            Ok(_) => Self::persisted(),
            Err(FlowError::Schema(
                SchemaError::FixedSchema
                | SchemaError::EmptyKey
                | SchemaError::DuplicateKey(_)
                | SchemaError::UnchangedKey(_),
            )) => Self::noop(),
            Err(e) => Self::rejected(e),
        }
    }

    fn with_ui_change(mut self) -> Self {
        self.ui_changed = true;
        self
    }
}

/// Process-wide editor state container.
///
/// All mutation goes through [`EditorStore::dispatch`]. Intents are applied
/// one at a time and in order; subscribers are notified only after an
/// intent has been fully applied, and the persister receives the new
/// persisted projection in the same step.
pub struct EditorStore {
    config: StoreConfig,
    graph: FlowGraph,
    node_types: NodeTypeRegistry,
    preferences: UserPreferences,
    ui: UiState,
    generation: u64,
    events: EventBus,
    persister: Option<PersisterHandle>,
    pending_notice: bool,
    rehydrate_diagnostics: Vec<String>,
    /// Set once `Rehydrated` has gone out to the first subscriber
    rehydrate_announced: AtomicBool,
}

impl EditorStore {
    /// Empty editor with the built-in node types
    pub fn new(config: StoreConfig) -> Self {
        Self::from_state(config, PersistedState::default())
    }

    fn from_state(config: StoreConfig, state: PersistedState) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        Self {
            config,
            graph: state.graph,
            node_types: state.node_types,
            preferences: state.user_preferences,
            ui: UiState::default(),
            generation: 0,
            events,
            persister: None,
            pending_notice: false,
            rehydrate_diagnostics: Vec::new(),
            rehydrate_announced: AtomicBool::new(true),
        }
    }

    /// Build a store from restored state. The restore diagnostics are kept
    /// and published as `Rehydrated` to the first subscriber.
    pub fn from_restored(config: StoreConfig, restored: Restored) -> Self {
        let mut store = Self::from_state(config, restored.state);
        tracing::info!(
            "Rehydrated {} node(s), {} edge(s) with {} diagnostic(s)",
            store.graph.nodes().len(),
            store.graph.edges().len(),
            restored.diagnostics.len()
        );
        store.rehydrate_diagnostics = restored.diagnostics;
        *store.rehydrate_announced.get_mut() = false;
        store
    }

    /// Rehydrate from snapshot bytes; malformed input yields an empty editor.
    pub fn rehydrate(config: StoreConfig, bytes: &[u8]) -> Self {
        Self::from_restored(config, restore(bytes))
    }

    /// Load from `storage` and start a background persister writing back to
    /// it. A storage failure is logged and the editor starts empty.
    pub async fn open(config: StoreConfig, storage: Arc<dyn SnapshotStorage>) -> (Self, Persister) {
        let restored = match storage.load().await {
            Ok(Some(bytes)) => restore(&bytes),
            Ok(None) => Restored::empty(),
            Err(e) => {
                tracing::warn!("Failed to load snapshot, starting empty: {}", e);
                Restored::fallback(vec![format!("failed to load snapshot: {}", e)])
            }
        };

        let mut store = Self::from_restored(config, restored);
        let persister = Persister::spawn(
            storage,
            store.config.persist_debounce,
            Some(store.events.clone()),
        );
        store.attach_persister(persister.handle());
        (store, persister)
    }

    pub fn attach_persister(&mut self, handle: PersisterHandle) {
        self.persister = Some(handle);
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn schema(&self, node_id: &str) -> Option<&VariableSchema> {
        self.graph.schema(node_id)
    }

    pub fn node_types(&self) -> &NodeTypeRegistry {
        &self.node_types
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        self.ui.editing.as_ref()
    }

    /// Bumped once per intent that changed anything.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Problems found while restoring the last snapshot.
    pub fn rehydrate_diagnostics(&self) -> &[String] {
        &self.rehydrate_diagnostics
    }

    /// On a restored store the first receiver also gets the `Rehydrated`
    /// event for that restore.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        let rx = self.events.subscribe();
        if !self.rehydrate_announced.swap(true, Ordering::SeqCst) {
            self.events.rehydrated(self.rehydrate_diagnostics.clone());
        }
        rx
    }

    /// The notice to display at `now`, if it has not expired.
    pub fn active_notice(&self, now: Instant) -> Option<&ActiveNotice> {
        self.ui.notice.as_ref().filter(|n| n.is_visible(now))
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            graph: self.graph.clone(),
            node_types: self.node_types.clone(),
            user_preferences: self.preferences.clone(),
        }
    }

    /// Apply one intent. Never fails: rejections are logged and reported in
    /// the returned outcome, and leave every slice unchanged.
    pub fn dispatch(&mut self, intent: Intent) -> IntentOutcome {
        let name = intent.name();
        let node_id = intent.node_id().map(str::to_string);

        let effect = if self.config.read_only && intent.is_mutation() {
            Effect::noop()
        } else {
            self.apply(intent)
        };

        if effect.outcome.is_committed() || effect.ui_changed {
            self.generation += 1;
            if effect.persist {
                self.schedule_persist();
            }
            self.events.committed(self.generation, name, node_id.clone());
        }
        if std::mem::take(&mut self.pending_notice) {
            self.events.warn(SANITIZE_NOTICE, self.config.notice_duration);
        }

        match &effect.outcome {
            IntentOutcome::Committed => {
                tracing::debug!("Committed {} (generation {})", name, self.generation)
            }
            IntentOutcome::NoOp => tracing::debug!("Ignored {} on {:?}", name, node_id),
            IntentOutcome::Rejected { reason } => {
                tracing::debug!("Rejected {} on {:?}: {}", name, node_id, reason)
            }
        }
        effect.outcome
    }

    fn schedule_persist(&self) {
        if let Some(persister) = &self.persister {
            persister.schedule(self.generation, self.persisted_state());
        }
    }

    fn raise_notice(&mut self) {
        self.ui.notice = Some(ActiveNotice::new(SANITIZE_NOTICE, self.config.notice_duration));
        self.pending_notice = true;
    }

    fn apply(&mut self, intent: Intent) -> Effect {
        match intent {
            Intent::RegisterNodeType { descriptor } => {
                if self.node_types.get(&descriptor.name) == Some(&descriptor) {
                    return Effect::noop();
                }
                self.node_types.register(descriptor);
                Effect::persisted()
            }
            Intent::AddNode {
                id,
                node_type,
                title,
                position,
                fixed_schema,
            } => self.add_node(id, node_type, title, position, fixed_schema),
            Intent::RemoveNode { node_id } => match self.graph.remove_node(&node_id) {
                Ok(_) => {
                    self.ui.forget_node(&node_id);
                    Effect::persisted()
                }
                Err(e) => Effect::rejected(e),
            },
            Intent::Connect {
                source,
                source_key,
                target,
                target_handle,
            } => Effect::from_graph(
                self.graph
                    .connect(Edge::new(source, source_key, target, target_handle))
                    .map(|_| ()),
            ),
            Intent::Disconnect { edge_id } => {
                Effect::from_graph(self.graph.disconnect(&edge_id).map(|_| ()))
            }
            Intent::SetTitle { node_id, title } => {
                if self.graph.config(&node_id).is_some_and(|c| c.title == title) {
                    return Effect::noop();
                }
                Effect::from_graph(self.graph.set_title(&node_id, title))
            }
            Intent::AddVariable {
                node_id,
                raw_key,
                value_type,
            } => self.add_variable(&node_id, &raw_key, value_type),
            Intent::DeleteVariable { node_id, key } => {
                let effect = Effect::from_sync(self.graph.delete_variable(&node_id, &key));
                self.prune_edit_session();
                effect
            }
            Intent::RenameVariable {
                node_id,
                old_key,
                new_raw_key,
            } => self.rename_variable(&node_id, &old_key, &new_raw_key),
            Intent::SetVariableType {
                node_id,
                key,
                value_type,
            } => {
                let unchanged = self
                    .graph
                    .schema(&node_id)
                    .and_then(|s| s.value_type(&key))
                    .is_some_and(|t| *t == value_type);
                if unchanged {
                    return Effect::noop();
                }
                Effect::from_sync(self.graph.set_variable_type(&node_id, &key, value_type))
            }
            Intent::SetCollapsed { node_id, collapsed } => self.set_collapsed(node_id, collapsed),
            Intent::OpenOutputPreview { node_id } => {
                if !self.graph.contains_node(&node_id) {
                    return Effect::rejected(GraphError::NodeNotFound(node_id));
                }
                if self.ui.preview_open.as_deref() == Some(node_id.as_str()) {
                    return Effect::noop();
                }
                self.ui.preview_open = Some(node_id);
                Effect::ui()
            }
            Intent::CloseOutputPreview => match self.ui.preview_open.take() {
                Some(_) => Effect::ui(),
                None => Effect::noop(),
            },
            Intent::BeginEdit { node_id, target } => self.begin_edit(node_id, target),
            Intent::UpdateDraft { text } => self.update_draft(&text),
            Intent::CommitEdit => self.commit_edit(),
            Intent::CancelEdit => match self.ui.editing.take() {
                Some(session) => {
                    tracing::debug!("Abandoned edit on {}", session.node_id);
                    Effect::ui()
                }
                None => Effect::noop(),
            },
            Intent::DismissNotice => match self.ui.notice.take() {
                Some(_) => Effect::ui(),
                None => Effect::noop(),
            },
            Intent::SetPreference { has_seen_welcome } => {
                if self.preferences.has_seen_welcome == has_seen_welcome {
                    return Effect::noop();
                }
                self.preferences.has_seen_welcome = has_seen_welcome;
                Effect::persisted()
            }
            Intent::SetNodePanelExpanded { expanded } => {
                if self.ui.panel.is_node_panel_expanded == expanded {
                    return Effect::noop();
                }
                self.ui.panel.is_node_panel_expanded = expanded;
                Effect::ui()
            }
        }
    }

    fn add_node(
        &mut self,
        id: Option<NodeId>,
        node_type: String,
        title: Option<String>,
        position: Option<Position>,
        fixed_schema: Option<Vec<VariableSpec>>,
    ) -> Effect {
        if !self.node_types.contains(&node_type) {
            return Effect::rejected(GraphError::UnknownNodeType(node_type));
        }

        let mut node = FlowNode::new(node_type);
        if let Some(id) = id {
            node = node.with_id(id);
        }
        node.position = position;

        let mut config = NodeConfig::new(title.unwrap_or_else(|| node.node_type.clone()));
        if let (true, Some(specs)) = (node.is_input(), fixed_schema) {
            config = config.with_schema(VariableSchema::fixed(
                specs.into_iter().map(|spec| (spec.key, spec.value_type)),
            ));
        }

        Effect::from_graph(self.graph.add_node(node, config))
    }

    fn is_fixed(&self, node_id: &str) -> bool {
        self.graph
            .schema(node_id)
            .is_some_and(VariableSchema::is_fixed)
    }

    fn add_variable(&mut self, node_id: &str, raw_key: &str, value_type: VariableType) -> Effect {
        if raw_key.trim().is_empty() || self.is_fixed(node_id) {
            return Effect::noop();
        }
        let effect = Effect::from_sync(self.graph.add_variable(node_id, raw_key, value_type));
        if sanitize(raw_key).changed {
            self.raise_notice();
            return effect.with_ui_change();
        }
        effect
    }

    fn rename_variable(&mut self, node_id: &str, old_key: &str, new_raw_key: &str) -> Effect {
        if self.is_fixed(node_id) || old_key == new_raw_key || new_raw_key.trim().is_empty() {
            return Effect::noop();
        }
        let mut effect =
            Effect::from_sync(self.graph.rename_variable(node_id, old_key, new_raw_key));
        self.prune_edit_session();
        if sanitize(new_raw_key).changed {
            self.raise_notice();
            effect = effect.with_ui_change();
        }
        effect
    }

    /// Close an edit session whose variable no longer exists.
    fn prune_edit_session(&mut self) {
        let stale = match &self.ui.editing {
            Some(EditSession {
                node_id,
                target: EditTarget::Existing { key },
                ..
            }) => !self.graph.schema(node_id).is_some_and(|s| s.contains(key)),
            _ => false,
        };
        if stale {
            self.ui.editing = None;
        }
    }

    fn set_collapsed(&mut self, node_id: NodeId, collapsed: bool) -> Effect {
        if !self.graph.contains_node(&node_id) {
            return Effect::rejected(GraphError::NodeNotFound(node_id));
        }
        let changed = if collapsed {
            if self
                .ui
                .editing
                .as_ref()
                .is_some_and(|s| s.node_id == node_id)
            {
                self.ui.editing = None;
            }
            self.ui.collapsed.insert(node_id)
        } else {
            self.ui.collapsed.remove(&node_id)
        };
        if changed {
            Effect::ui()
        } else {
            Effect::noop()
        }
    }

    fn begin_edit(&mut self, node_id: NodeId, target: EditTarget) -> Effect {
        if !self.graph.contains_node(&node_id) {
            return Effect::rejected(GraphError::NodeNotFound(node_id));
        }
        let Some(schema) = self.graph.schema(&node_id) else {
            return Effect::rejected(GraphError::NotAnInputNode(node_id));
        };
        if self.config.read_only || schema.is_fixed() || self.ui.is_collapsed(&node_id) {
            return Effect::noop();
        }
        let draft = match &target {
            EditTarget::NewVariable => String::new(),
            EditTarget::Existing { key } if schema.contains(key) => key.clone(),
            EditTarget::Existing { key } => {
                return Effect::rejected(SchemaError::KeyNotFound(key.clone()))
            }
        };

        self.ui.editing = Some(EditSession {
            node_id,
            target,
            draft,
        });
        Effect::ui()
    }

    /// Drafts are sanitized while typing.
    fn update_draft(&mut self, text: &str) -> Effect {
        if self.ui.editing.is_none() {
            return Effect::noop();
        }
        let sanitized = sanitize(text);
        if sanitized.changed {
            self.raise_notice();
        }
        match self.ui.editing.as_mut() {
            Some(session) if session.draft != sanitized.key => {
                session.draft = sanitized.key;
                Effect::ui()
            }
            _ => Effect::noop(),
        }
    }

    /// Hand the draft to add/rename. The session closes whatever the outcome.
    fn commit_edit(&mut self) -> Effect {
        let Some(session) = self.ui.editing.take() else {
            return Effect::noop();
        };
        let effect = match session.target {
            EditTarget::NewVariable => {
                self.add_variable(&session.node_id, &session.draft, VariableType::default())
            }
            EditTarget::Existing { key } => {
                self.rename_variable(&session.node_id, &key, &session.draft)
            }
        };
        effect.with_ui_change()
    }

    /// Read-only projection of one node for rendering
    pub fn node_view(&self, node_id: &str) -> Option<NodeView> {
        let node = self.graph.node(node_id)?;
        let config = self.graph.config(node_id)?;

        let variables: Vec<VariableRow> = match self.graph.schema(node_id) {
            Some(schema) => schema
                .iter()
                .map(|(key, value_type)| VariableRow {
                    key: key.to_string(),
                    value_type: value_type.clone(),
                })
                .collect(),
            None => Vec::new(),
        };
        let incoming: Vec<IncomingRow> = self
            .graph
            .edges()
            .incoming(node_id)
            .map(|e| IncomingRow {
                edge_id: e.id.clone(),
                source: e.source.clone(),
                target_handle: e.target_handle.clone(),
            })
            .collect();
        let outgoing: Vec<Edge> = self.graph.edges().outgoing(node_id).cloned().collect();

        let is_fixed = node.is_input() && config.has_fixed_output();
        let collapsed = self.ui.is_collapsed(node_id);
        let width_px = suggested_width(
            incoming.iter().map(|r| r.source.as_str()),
            variables.iter().map(|v| v.key.as_str()),
            &config.title,
        );
        let editing = self
            .ui
            .editing
            .as_ref()
            .filter(|s| s.node_id == node_id)
            .map(|s| (s.target.clone(), s.draft.clone()));

        Some(NodeView {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            title: config.title.clone(),
            variables,
            is_fixed,
            collapsed,
            editable: node.is_input() && !self.config.read_only && !is_fixed && !collapsed,
            connectable: !collapsed,
            incoming,
            outgoing,
            editing,
            preview_open: self.ui.preview_open.as_deref() == Some(node_id),
            width_px,
        })
    }
}

impl Default for EditorStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
