use async_trait::async_trait;
use flowschema::PersistenceError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Backend holding the most recent snapshot
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError>;

    async fn save(&self, bytes: Vec<u8>) -> Result<(), PersistenceError>;
}

/// In-process storage, mostly for tests
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<Option<Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(bytes.into())),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.data.lock().await.clone()
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.data.lock().await.clone())
    }

    async fn save(&self, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        *self.data.lock().await = Some(bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Single JSON file on disk, replaced atomically on every save
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStorage for FileStorage {
    async fn load(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        tracing::debug!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}
