// crates/flowstate/tests/persist_test.rs

use flowschema::{StateEvent, VariableType, INPUT_NODE_TYPE};
use flowstate::{
    restore, snapshot, EditorStore, FileStorage, Intent, MemoryStorage, PersistedState,
    Persister, SnapshotStorage, StoreConfig, PASSTHROUGH_NODE_TYPE, SNAPSHOT_VERSION, WHITELIST,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn populated() -> EditorStore {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut store = EditorStore::default();
    for intent in [
        Intent::AddNode {
            id: Some("in".to_string()),
            node_type: INPUT_NODE_TYPE.to_string(),
            title: Some("Inputs".to_string()),
            position: None,
            fixed_schema: None,
        },
        Intent::AddNode {
            id: Some("out".to_string()),
            node_type: PASSTHROUGH_NODE_TYPE.to_string(),
            title: None,
            position: None,
            fixed_schema: None,
        },
        Intent::AddVariable {
            node_id: "in".to_string(),
            raw_key: "first name".to_string(),
            value_type: VariableType::String,
        },
        Intent::AddVariable {
            node_id: "in".to_string(),
            raw_key: "age".to_string(),
            value_type: VariableType::Integer,
        },
        Intent::Connect {
            source: "in".to_string(),
            source_key: Some("first_name".to_string()),
            target: "out".to_string(),
            target_handle: "value".to_string(),
        },
        Intent::SetCollapsed {
            node_id: "out".to_string(),
            collapsed: true,
        },
        Intent::SetPreference {
            has_seen_welcome: true,
        },
    ] {
        store.dispatch(intent);
    }
    store
}

fn config(debounce: Duration) -> StoreConfig {
    StoreConfig {
        persist_debounce: debounce,
        ..StoreConfig::default()
    }
}

#[test]
fn snapshot_round_trips_persisted_slices() {
    let state = populated().persisted_state();

    let restored = restore(&snapshot(&state).unwrap());

    assert!(restored.is_clean(), "{:?}", restored.diagnostics);
    assert_eq!(restored.state, state);
}

#[test]
fn snapshot_holds_only_whitelisted_slices() {
    let bytes = snapshot(&populated().persisted_state()).unwrap();
    let root: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(root["version"], json!(SNAPSHOT_VERSION));
    let mut slices: Vec<&str> = root["slices"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    slices.sort_unstable();
    let mut expected: Vec<&str> = WHITELIST.iter().map(|s| s.name()).collect();
    expected.sort_unstable();
    assert_eq!(slices, expected);

    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains("collapsed"));
}

#[test]
fn malformed_bytes_restore_to_defaults() {
    for bytes in [&b"not json"[..], &b"[1, 2, 3]"[..], &b""[..]] {
        let restored = restore(bytes);
        assert!(!restored.is_clean());
        assert_eq!(restored.state, PersistedState::default());
    }
}

#[test]
fn bad_items_are_dropped_individually() {
    let bytes = serde_json::to_vec(&json!({
        "version": 1,
        "slices": {
            "nodes": [
                { "id": "in", "node_type": "InputNode" },
                { "id": "out", "node_type": "Passthrough" },
                { "node_type": "missing id" }
            ],
            "edges": [
                { "id": "e1", "source": "in", "source_key": "a", "target": "out", "target_handle": "value" },
                { "bogus": true },
                { "id": "e2", "source": "in", "source_key": "gone", "target": "out", "target_handle": "x" }
            ],
            "node_configs": {
                "in": { "title": "Inputs", "output_schema": { "keys": ["a"], "types": { "a": "string" } } },
                "out": { "title": "Out" }
            },
            "user_preferences": "oops"
        }
    }))
    .unwrap();

    let restored = restore(&bytes);
    let graph = &restored.state.graph;

    assert_eq!(graph.nodes().len(), 2);
    assert_eq!(graph.edges().len(), 1);
    assert!(graph.edges().get("e1").is_some());
    assert_eq!(graph.schema("in").unwrap().keys(), &["a"]);
    assert!(!restored.state.user_preferences.has_seen_welcome);
    assert!(graph.check_invariants().is_empty());

    let diagnostics = restored.diagnostics.join("\n");
    assert!(diagnostics.contains("nodes[2]"));
    assert!(diagnostics.contains("edges[1]"));
    assert!(diagnostics.contains("dropped edge e2"));
    assert!(diagnostics.contains("user_preferences"));
}

#[test]
fn flat_snapshots_are_accepted() {
    let bytes = serde_json::to_vec(&json!({
        "nodes": [{ "id": "in", "node_type": "InputNode" }],
        "node_configs": { "in": { "title": "Inputs", "output_schema": { "keys": ["bad key", "ok"] } } },
        "user_preferences": { "has_seen_welcome": true }
    }))
    .unwrap();

    let restored = restore(&bytes);

    assert_eq!(
        restored.state.graph.schema("in").unwrap().keys(),
        &["bad_key", "ok"]
    );
    assert!(restored.state.user_preferences.has_seen_welcome);
    assert!(restored
        .diagnostics
        .iter()
        .any(|d| d.contains("no version")));
}

#[test]
fn newer_snapshots_load_what_is_understood() {
    let bytes = serde_json::to_vec(&json!({
        "version": SNAPSHOT_VERSION + 1,
        "slices": {
            "nodes": [{ "id": "in", "node_type": "InputNode", "shape": "hexagon" }],
            "node_configs": { "in": { "title": "Inputs" } },
            "viewport": { "zoom": 2 }
        }
    }))
    .unwrap();

    let restored = restore(&bytes);

    assert!(restored.state.graph.contains_node("in"));
    assert!(restored.diagnostics.iter().any(|d| d.contains("newer")));
}

#[test]
fn persisted_node_types_survive_alongside_builtins() {
    let mut store = EditorStore::default();
    store.dispatch(Intent::RegisterNodeType {
        descriptor: flowstate::NodeTypeDescriptor::new("HttpRequest").with_category("network"),
    });

    let restored = restore(&snapshot(&store.persisted_state()).unwrap());

    assert!(restored.state.node_types.contains("HttpRequest"));
    assert!(restored.state.node_types.contains(INPUT_NODE_TYPE));
    assert!(restored.state.node_types.contains(PASSTHROUGH_NODE_TYPE));
}

#[tokio::test]
async fn persister_coalesces_bursts() {
    let storage = Arc::new(MemoryStorage::new());
    let persister = Persister::spawn(storage.clone(), Duration::from_millis(50), None);
    let handle = persister.handle();

    let store = populated();
    for generation in 1..=5 {
        handle.schedule(generation, store.persisted_state());
    }
    persister.flush().await;

    assert_eq!(storage.writes(), 1);
    let restored = restore(&storage.contents().await.unwrap());
    assert_eq!(restored.state, store.persisted_state());

    persister.flush().await;
    assert_eq!(storage.writes(), 1);
    persister.shutdown().await;
}

#[tokio::test]
async fn shutdown_writes_pending_state() {
    let storage = Arc::new(MemoryStorage::new());
    let persister = Persister::spawn(storage.clone(), Duration::from_secs(30), None);

    persister
        .handle()
        .schedule(1, populated().persisted_state());
    persister.shutdown().await;

    assert_eq!(storage.writes(), 1);
}

#[tokio::test]
async fn persister_reports_writes() {
    let events = flowschema::EventBus::default();
    let mut rx = events.subscribe();
    let storage = Arc::new(MemoryStorage::new());
    let persister = Persister::spawn(storage.clone(), Duration::from_millis(10), Some(events));

    persister.handle().schedule(7, PersistedState::default());
    persister.flush().await;

    match rx.recv().await.unwrap() {
        StateEvent::Persisted {
            generation, bytes, ..
        } => {
            assert_eq!(generation, 7);
            assert!(bytes > 0);
        }
        other => panic!("expected persisted event, got {:?}", other),
    }
    persister.shutdown().await;
}

#[tokio::test]
async fn file_storage_replaces_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("editor.json");
    let storage = FileStorage::new(&path);

    assert!(storage.load().await.unwrap().is_none());

    storage.save(b"first".to_vec()).await.unwrap();
    storage.save(b"second".to_vec()).await.unwrap();

    assert_eq!(storage.load().await.unwrap(), Some(b"second".to_vec()));
    assert!(!dir.path().join("nested").join("editor.json.tmp").exists());
}

#[tokio::test]
async fn store_writes_through_and_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("editor.json");

    let (mut store, persister) =
        EditorStore::open(config(Duration::from_millis(10)), Arc::new(FileStorage::new(&path)))
            .await;
    store.dispatch(Intent::AddNode {
        id: Some("in".to_string()),
        node_type: INPUT_NODE_TYPE.to_string(),
        title: None,
        position: None,
        fixed_schema: None,
    });
    store.dispatch(Intent::AddVariable {
        node_id: "in".to_string(),
        raw_key: "email".to_string(),
        value_type: VariableType::String,
    });
    store.dispatch(Intent::SetCollapsed {
        node_id: "in".to_string(),
        collapsed: true,
    });
    persister.shutdown().await;

    let (reopened, persister) =
        EditorStore::open(StoreConfig::default(), Arc::new(FileStorage::new(&path))).await;

    assert_eq!(reopened.schema("in").unwrap().keys(), &["email"]);
    assert!(!reopened.ui().is_collapsed("in"));
    persister.shutdown().await;
}

#[tokio::test]
async fn corrupt_storage_opens_empty() {
    let storage = Arc::new(MemoryStorage::with_bytes("{{{"));

    let (mut store, persister) =
        EditorStore::open(config(Duration::from_millis(10)), storage.clone()).await;

    assert!(store.graph().nodes().is_empty());

    store.dispatch(Intent::SetPreference {
        has_seen_welcome: true,
    });
    persister.flush().await;

    let restored = restore(&storage.contents().await.unwrap());
    assert!(restored.is_clean());
    assert!(restored.state.user_preferences.has_seen_welcome);
    persister.shutdown().await;
}

#[tokio::test]
async fn first_subscriber_sees_restore_diagnostics() {
    let storage = Arc::new(MemoryStorage::with_bytes("{not json"));

    let (store, persister) = EditorStore::open(StoreConfig::default(), storage).await;
    assert!(!store.rehydrate_diagnostics().is_empty());

    let mut rx = store.subscribe();
    match rx.try_recv().unwrap() {
        StateEvent::Rehydrated { diagnostics, .. } => {
            assert_eq!(diagnostics, store.rehydrate_diagnostics());
            assert!(diagnostics[0].contains("not valid JSON"));
        }
        other => panic!("expected rehydrated event, got {:?}", other),
    }

    let mut later = store.subscribe();
    assert!(later.try_recv().is_err());
    assert!(rx.try_recv().is_err());
    persister.shutdown().await;
}

#[test]
fn fresh_store_announces_no_restore() {
    let store = EditorStore::default();
    let mut rx = store.subscribe();
    assert!(rx.try_recv().is_err());
}

#[test]
fn unregistered_node_types_are_reported() {
    let bytes = serde_json::to_vec(&json!({
        "version": 1,
        "slices": {
            "nodes": [{ "id": "http", "node_type": "HttpRequest" }],
            "node_configs": { "http": { "title": "Fetch" } }
        }
    }))
    .unwrap();

    let restored = restore(&bytes);

    assert!(restored.state.graph.contains_node("http"));
    assert!(restored
        .diagnostics
        .iter()
        .any(|d| d.contains("unregistered type HttpRequest")));
}
