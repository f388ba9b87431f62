use crate::{NodeTypeDescriptor, NodeTypeRegistry, UserPreferences};
use chrono::Utc;
use flowschema::{Edge, FlowGraph, FlowNode, NodeConfig, PersistenceError};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Bumped whenever the layout of a slice changes incompatibly.
pub const SNAPSHOT_VERSION: u64 = 1;

/// Top-level state slices that are written to a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice {
    Nodes,
    Edges,
    NodeConfigs,
    NodeTypes,
    UserPreferences,
}

/// Everything else (collapse flags, open previews, edit drafts, notices,
/// panel state) is ephemeral.
pub const WHITELIST: [Slice; 5] = [
    Slice::Nodes,
    Slice::Edges,
    Slice::NodeConfigs,
    Slice::NodeTypes,
    Slice::UserPreferences,
];

impl Slice {
    pub fn name(self) -> &'static str {
        match self {
            Slice::Nodes => "nodes",
            Slice::Edges => "edges",
            Slice::NodeConfigs => "node_configs",
            Slice::NodeTypes => "node_types",
            Slice::UserPreferences => "user_preferences",
        }
    }

    fn encode(self, state: &PersistedState) -> Result<Value, serde_json::Error> {
        match self {
            Slice::Nodes => serde_json::to_value(state.graph.nodes()),
            Slice::Edges => serde_json::to_value(state.graph.edges()),
            Slice::NodeConfigs => serde_json::to_value(state.graph.node_configs()),
            Slice::NodeTypes => serde_json::to_value(&state.node_types),
            Slice::UserPreferences => serde_json::to_value(&state.user_preferences),
        }
    }
}

/// The persisted projection of editor state
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub graph: FlowGraph,
    pub node_types: NodeTypeRegistry,
    pub user_preferences: UserPreferences,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            graph: FlowGraph::new(),
            node_types: NodeTypeRegistry::with_builtins(),
            user_preferences: UserPreferences::default(),
        }
    }
}

/// Outcome of `restore`: always a usable state, plus whatever had to be
/// dropped or defaulted along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub state: PersistedState,
    pub diagnostics: Vec<String>,
}

impl Restored {
    pub fn empty() -> Self {
        Self::fallback(Vec::new())
    }

    pub fn fallback(diagnostics: Vec<String>) -> Self {
        Self {
            state: PersistedState::default(),
            diagnostics,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub fn snapshot(state: &PersistedState) -> Result<Vec<u8>, PersistenceError> {
    let mut slices = Map::new();
    for slice in WHITELIST {
        slices.insert(slice.name().to_string(), slice.encode(state)?);
    }
    let envelope = json!({
        "version": SNAPSHOT_VERSION,
        "saved_at": Utc::now(),
        "slices": slices,
    });
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

fn decode_list<T: DeserializeOwned>(
    slices: &mut Map<String, Value>,
    slice: Slice,
    diagnostics: &mut Vec<String>,
) -> Vec<T> {
    match slices.remove(slice.name()) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value(item) {
                Ok(value) => Some(value),
                Err(e) => {
                    diagnostics.push(format!("skipped {}[{}]: {}", slice.name(), i, e));
                    None
                }
            })
            .collect(),
        Some(_) => {
            diagnostics.push(format!("{} is not a list, using default", slice.name()));
            Vec::new()
        }
    }
}

fn decode_configs(
    slices: &mut Map<String, Value>,
    diagnostics: &mut Vec<String>,
) -> BTreeMap<String, NodeConfig> {
    let name = Slice::NodeConfigs.name();
    match slices.remove(name) {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(entries)) => entries
            .into_iter()
            .filter_map(|(node_id, raw)| match serde_json::from_value(raw) {
                Ok(config) => Some((node_id, config)),
                Err(e) => {
                    diagnostics.push(format!("skipped {}[{}]: {}", name, node_id, e));
                    None
                }
            })
            .collect(),
        Some(_) => {
            diagnostics.push(format!("{} is not a map, using default", name));
            BTreeMap::new()
        }
    }
}

fn decode_preferences(
    slices: &mut Map<String, Value>,
    diagnostics: &mut Vec<String>,
) -> UserPreferences {
    let name = Slice::UserPreferences.name();
    match slices.remove(name) {
        None | Some(Value::Null) => UserPreferences::default(),
        Some(raw) => serde_json::from_value(raw).unwrap_or_else(|e| {
            diagnostics.push(format!("{} is malformed, using default: {}", name, e));
            UserPreferences::default()
        }),
    }
}

/// Rebuild state from snapshot bytes. Never fails: anything unreadable
/// falls back to defaults and is reported in `diagnostics`.
///
/// Each slice is decoded independently and list slices item by item, so one
/// bad edge does not cost the whole graph. Unknown fields and slices are
/// ignored. Snapshots without the `slices` envelope are read as a flat map
/// of slices.
pub fn restore(bytes: &[u8]) -> Restored {
    let mut diagnostics = Vec::new();

    let root: Value = match serde_json::from_slice(bytes) {
        Ok(root) => root,
        Err(e) => {
            let message = format!("snapshot is not valid JSON, starting empty: {}", e);
            tracing::warn!("{}", message);
            return Restored::fallback(vec![message]);
        }
    };
    let Value::Object(mut root) = root else {
        let message = "snapshot root is not an object, starting empty".to_string();
        tracing::warn!("{}", message);
        return Restored::fallback(vec![message]);
    };

    match root.get("version").and_then(Value::as_u64) {
        Some(v) if v > SNAPSHOT_VERSION => diagnostics.push(format!(
            "snapshot version {} is newer than {}, loading what is understood",
            v, SNAPSHOT_VERSION
        )),
        Some(_) => {}
        None => diagnostics.push("snapshot has no version, assuming current".to_string()),
    }

    let mut slices = match root.remove("slices") {
        Some(Value::Object(slices)) => slices,
        Some(_) => {
            diagnostics.push("slices is not an object, using defaults".to_string());
            Map::new()
        }
        None => root,
    };

    let nodes: Vec<FlowNode> = decode_list(&mut slices, Slice::Nodes, &mut diagnostics);
    let edges: Vec<Edge> = decode_list(&mut slices, Slice::Edges, &mut diagnostics);
    let configs = decode_configs(&mut slices, &mut diagnostics);
    let descriptors: Vec<NodeTypeDescriptor> =
        decode_list(&mut slices, Slice::NodeTypes, &mut diagnostics);
    let user_preferences = decode_preferences(&mut slices, &mut diagnostics);

    for unknown in slices.keys().filter(|k| !matches!(k.as_str(), "version" | "saved_at")) {
        tracing::debug!("Ignoring unknown snapshot slice '{}'", unknown);
    }

    let mut node_types = NodeTypeRegistry::with_builtins();
    for descriptor in descriptors {
        node_types.register(descriptor);
    }

    let (graph, repairs) = FlowGraph::from_parts(nodes, edges, configs);
    diagnostics.extend(repairs);
    for node in graph.nodes().iter().filter(|n| !node_types.contains(&n.node_type)) {
        diagnostics.push(format!(
            "node {} has unregistered type {}",
            node.id, node.node_type
        ));
    }

    for diagnostic in &diagnostics {
        tracing::warn!("Snapshot restore: {}", diagnostic);
    }

    Restored {
        state: PersistedState {
            graph,
            node_types,
            user_preferences,
        },
        diagnostics,
    }
}
