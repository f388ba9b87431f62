//! Editor state container
//!
//! This crate turns user intents into committed state: it dispatches every
//! intent through the schema-edge synchronizer, keeps the ephemeral UI
//! slices, notifies subscribers after each commit and hands persisted
//! slices to a debounced background writer.

mod catalog;
mod config;
mod intent;
pub mod persist;
mod store;
mod ui;
mod view;

pub use catalog::{NodeTypeDescriptor, NodeTypeRegistry, PortDefinition, PASSTHROUGH_NODE_TYPE};
pub use config::StoreConfig;
pub use intent::{EditTarget, Intent, IntentOutcome, VariableSpec};
pub use persist::{
    restore, snapshot, FileStorage, MemoryStorage, PersistedState, Persister, PersisterHandle,
    Restored, Slice, SnapshotStorage, SNAPSHOT_VERSION, WHITELIST,
};
pub use store::EditorStore;
pub use ui::{ActiveNotice, EditSession, PanelState, UiState, UserPreferences, SANITIZE_NOTICE};
pub use view::{suggested_width, IncomingRow, NodeView, VariableRow};
