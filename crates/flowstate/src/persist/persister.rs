use super::snapshot::{snapshot, PersistedState};
use super::storage::SnapshotStorage;
use flowschema::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Pending {
    generation: u64,
    state: PersistedState,
}

type Latest = Option<Arc<Pending>>;

/// Cheap handle used by the store to hand over state after each commit
#[derive(Clone)]
pub struct PersisterHandle {
    latest: Arc<watch::Sender<Latest>>,
    flush: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl PersisterHandle {
    /// Replace the pending snapshot with `state`. Never blocks; anything not
    /// yet written is superseded.
    pub fn schedule(&self, generation: u64, state: PersistedState) {
        self.latest
            .send_replace(Some(Arc::new(Pending { generation, state })));
    }

    /// Write the pending snapshot now and wait until it is stored.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.flush.send(ack).is_ok() {
            let _ = done.await;
        }
    }
}

/// Background snapshot writer.
///
/// Only the newest scheduled state is kept. After the first change the
/// worker waits for the debounce window, then writes whatever is latest at
/// that point, so bursts of edits produce one write. Writes happen one at a
/// time on the worker task, and a generation that is already stored is not
/// written again.
pub struct Persister {
    handle: PersisterHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Persister {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(
        storage: Arc<dyn SnapshotStorage>,
        debounce: Duration,
        events: Option<EventBus>,
    ) -> Self {
        let (latest_tx, latest_rx) = watch::channel(None);
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let worker = Worker {
            storage,
            debounce,
            events,
            latest: latest_rx,
            flush: flush_rx,
            cancel: cancel.clone(),
            last_written: None,
        };
        let task = tokio::spawn(worker.run());

        Self {
            handle: PersisterHandle {
                latest: Arc::new(latest_tx),
                flush: flush_tx,
            },
            cancel,
            task,
        }
    }

    pub fn handle(&self) -> PersisterHandle {
        self.handle.clone()
    }

    pub async fn flush(&self) {
        self.handle.flush().await;
    }

    /// Write anything pending and stop the worker.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("Persister task failed: {}", e);
        }
    }
}

struct Worker {
    storage: Arc<dyn SnapshotStorage>,
    debounce: Duration,
    events: Option<EventBus>,
    latest: watch::Receiver<Latest>,
    flush: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    cancel: CancellationToken,
    last_written: Option<u64>,
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!("Persister started (debounce {:?})", self.debounce);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                changed = self.latest.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.debounce_then_write().await;
                }
                Some(ack) = self.flush.recv() => {
                    self.write_latest().await;
                    let _ = ack.send(());
                }
            }
        }

        self.write_latest().await;
        while let Ok(ack) = self.flush.try_recv() {
            let _ = ack.send(());
        }
        tracing::debug!("Persister stopped");
    }

    async fn debounce_then_write(&mut self) {
        let mut ack = None;
        tokio::select! {
            _ = tokio::time::sleep(self.debounce) => {}
            _ = self.cancel.cancelled() => {}
            Some(requested) = self.flush.recv() => ack = Some(requested),
        }
        self.write_latest().await;
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    async fn write_latest(&mut self) {
        let pending = self.latest.borrow_and_update().clone();
        let Some(pending) = pending else {
            return;
        };
        if self.last_written.is_some_and(|g| g >= pending.generation) {
            return;
        }

        let bytes = match snapshot(&pending.state) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to encode snapshot {}: {}", pending.generation, e);
                return;
            }
        };
        let len = bytes.len();

        match self.storage.save(bytes).await {
            Ok(()) => {
                self.last_written = Some(pending.generation);
                tracing::debug!("Persisted generation {} ({} bytes)", pending.generation, len);
                if let Some(events) = &self.events {
                    events.persisted(pending.generation, len);
                }
            }
            Err(e) => {
                tracing::error!("Failed to persist generation {}: {}", pending.generation, e);
            }
        }
    }
}
