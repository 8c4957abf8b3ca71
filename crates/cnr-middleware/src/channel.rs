//! The [`MessageChannel`] seam between the panel core and its transport.
//!
//! The core publishes and forgets: it never awaits, retries or inspects a
//! delivery result.  Implementations swallow (and log) their own transport
//! failures.

use std::sync::Mutex;

/// Fire-and-forget publish interface.
///
/// Topic names consumed by the panel are `"/robot_command/{robot}"` for raw
/// commands and `"/human_sensor"` for encoded observations.
pub trait MessageChannel: Send + Sync {
    /// Publish `payload` on `topic`.  No acknowledgement, no ordering
    /// guarantee across distinct topics.
    fn publish(&self, topic: &str, payload: &str);
}

/// A [`MessageChannel`] that records every publish in memory.
///
/// Used as a dry-run transport and as a test double.
///
/// ```
/// use cnr_middleware::{MemoryChannel, MessageChannel};
///
/// let channel = MemoryChannel::new();
/// channel.publish("/human_sensor", "Maybe nothing  unknown .");
/// assert_eq!(channel.published().len(), 1);
/// ```
#[derive(Default)]
pub struct MemoryChannel {
    log: Mutex<Vec<(String, String)>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every `(topic, payload)` pair published so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// The most recent publish, if any.
    pub fn last(&self) -> Option<(String, String)> {
        self.log.lock().ok().and_then(|log| log.last().cloned())
    }
}

impl MessageChannel for MemoryChannel {
    fn publish(&self, topic: &str, payload: &str) {
        if let Ok(mut log) = self.log.lock() {
            log.push((topic.to_string(), payload.to_string()));
        }
    }
}
