// Push event feed
//
// Uses a tokio broadcast channel to fan model change events out to every
// collection that is listening. The websocket transport publishes into it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Change notification for one record of one model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelEvent {
    /// Model name, e.g. `Service`
    pub model: String,
    pub msg: EventMessage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub changed_fields: Vec<String>,
    /// Full record after the change
    pub object: serde_json::Value,
    #[serde(default)]
    pub pk: Option<i64>,
}

impl ModelEvent {
    pub fn new(model: impl Into<String>, object: serde_json::Value) -> Self {
        Self {
            model: model.into(),
            msg: EventMessage {
                changed_fields: Vec::new(),
                object,
                pk: None,
            },
        }
    }

    /// Mark the record as deleted
    pub fn deleted(mut self) -> Self {
        self.msg.changed_fields.push("deleted".to_string());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.msg.changed_fields.iter().any(|f| f == "deleted")
    }
}

/// Broadcaster for model change events
#[derive(Clone)]
pub struct EventFeed {
    sender: broadcast::Sender<ModelEvent>,
}

impl EventFeed {
    /// Create a new feed with buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all listeners
    pub fn publish(&self, event: ModelEvent) {
        trace!(target: "feed", model = %event.model, "Publishing model event");
        // Ignore error if no subscribers
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.sender.subscribe()
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}
