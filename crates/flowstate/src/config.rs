use std::time::Duration;

/// Configuration for the editor store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the state event channel
    pub event_buffer_size: usize,
    /// Quiet period before a pending snapshot is written
    pub persist_debounce: Duration,
    /// How long transient notices stay visible
    pub notice_duration: Duration,
    /// Refuse every graph and schema mutation
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            persist_debounce: Duration::from_millis(250),
            notice_duration: Duration::from_secs(3),
            read_only: false,
        }
    }
}
