//! Persistence adapter
//!
//! `snapshot`/`restore` convert between in-memory state and bytes using an
//! explicit, versioned whitelist of slices. The `Persister` writes snapshots
//! in the background so mutations never wait on storage.

mod persister;
mod snapshot;
mod storage;

pub use persister::{Persister, PersisterHandle};
pub use snapshot::{restore, snapshot, PersistedState, Restored, Slice, SNAPSHOT_VERSION, WHITELIST};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage};
