use crate::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// Notifications published to presentation subscribers.
///
/// Events are emitted only after an intent has been fully applied, so a
/// subscriber reading the store on receipt always sees schema and edges in
/// agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StateEvent {
    Committed {
        generation: u64,
        intent: String,
        node_id: Option<NodeId>,
        timestamp: DateTime<Utc>,
    },
    Warning {
        message: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    Rehydrated {
        diagnostics: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    Persisted {
        generation: u64,
        bytes: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Process-wide fan-out of state events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StateEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: StateEvent) {
        let _ = self.sender.send(event);
    }

    pub fn committed(&self, generation: u64, intent: impl Into<String>, node_id: Option<NodeId>) {
        self.emit(StateEvent::Committed {
            generation,
            intent: intent.into(),
            node_id,
            timestamp: Utc::now(),
        });
    }

    /// Transient user-facing warning
    pub fn warn(&self, message: impl Into<String>, duration: Duration) {
        self.emit(StateEvent::Warning {
            message: message.into(),
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    pub fn rehydrated(&self, diagnostics: Vec<String>) {
        self.emit(StateEvent::Rehydrated {
            diagnostics,
            timestamp: Utc::now(),
        });
    }

    pub fn persisted(&self, generation: u64, bytes: usize) {
        self.emit(StateEvent::Persisted {
            generation,
            bytes,
            timestamp: Utc::now(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
