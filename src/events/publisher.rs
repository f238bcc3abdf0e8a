use crate::constants::system::DEFAULT_EVENT_CAPACITY;
use serde_json::{json, Value};
use tokio::sync::broadcast;

/// Broadcast publisher for enrollment lifecycle events.
///
/// Cloning shares the underlying channel, so every engine component can hold
/// its own handle while listeners see a single stream.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<CadenceEvent>,
}

/// A published lifecycle or engagement event.
#[derive(Debug, Clone)]
pub struct CadenceEvent {
    /// Dotted event name, e.g. `enrollment.advanced`
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl CadenceEvent {
    /// Enrollment id carried in the context, when present.
    pub fn enrollment_id(&self) -> Option<i64> {
        self.context.get("enrollment_id").and_then(Value::as_i64)
    }
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context.
    ///
    /// Publishing with no subscribers is not an error: the engine emits the
    /// same stream whether or not anyone is listening.
    pub async fn publish(
        &self,
        event_name: impl Into<String>,
        context: Value,
    ) -> Result<(), PublishError> {
        let event = CadenceEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        match self.sender.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }

    /// Publish an enrollment-scoped event. Merges the enrollment and sequence
    /// ids into `extra` so every enrollment event carries both.
    pub async fn publish_enrollment(
        &self,
        event_name: &str,
        enrollment_id: i64,
        sequence_id: i64,
        extra: Value,
    ) -> Result<(), PublishError> {
        let mut context = json!({
            "enrollment_id": enrollment_id,
            "sequence_id": sequence_id,
        });

        if let (Some(target), Some(source)) = (context.as_object_mut(), extra.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }

        self.publish(event_name, context).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CadenceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
