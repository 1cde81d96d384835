//! Event types and EventBus
//!
//! Harvest progress is published on a broadcast bus so the command layer (or
//! anything else embedding the harvester) can react to finished passes and
//! alias changes without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// quotekeeper event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEvent {
    /// A reconciliation pass began
    PassStarted {
        pass_id: Uuid,
        /// Lower bound of the fetch (exclusive); `None` means full history
        after: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },

    /// A pass finished and both archive and watermark were written
    PassCompleted {
        pass_id: Uuid,
        examined: usize,
        recorded: usize,
        duplicates: usize,
        skipped: usize,
        watermark: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A pass was aborted; its in-memory changes were discarded
    PassFailed {
        pass_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// An alias was attached to a canonical author
    AliasAdded {
        author: String,
        alias: String,
        timestamp: DateTime<Utc>,
    },

    /// An alias was detached from a canonical author
    AliasRemoved {
        author: String,
        alias: String,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HarvestEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<HarvestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: HarvestEvent,
    ) -> Result<usize, broadcast::error::SendError<HarvestEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: HarvestEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias_added() -> HarvestEvent {
        HarvestEvent::AliasAdded {
            author: "sam".to_string(),
            alias: "sammy".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let event = alias_added();
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(alias_added()).is_err());
        // Lossy emit must not panic
        bus.emit_lossy(alias_added());
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 10);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(alias_added()).unwrap();
        assert_eq!(json["type"], "AliasAdded");
        assert_eq!(json["alias"], "sammy");
    }
}
