//! Domain event system — fire-and-forget notifications to observers.
//!
//! The core publishes an event whenever an operator might want to react:
//! a command waiting for approval, a chat reply, a work unit finishing.
//! Publishing never blocks and never fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::store::{CommandStatus, WorkKind, WorkStatus};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The agent proposed a command; emitted at submission regardless of monitor mode
    CommandProposed {
        command_id: String,
        command: String,
        timestamp: DateTime<Utc>,
    },

    /// An approver accepted or rejected a pending command
    CommandDecided {
        command_id: String,
        status: CommandStatus,
        timestamp: DateTime<Utc>,
    },

    /// A chat mission finished
    ChatResponse {
        message_id: String,
        response: String,
        status: WorkStatus,
        timestamp: DateTime<Utc>,
    },

    /// A scan or patch work unit changed status
    WorkStatusChanged {
        work_id: String,
        kind: WorkKind,
        status: WorkStatus,
        timestamp: DateTime<Utc>,
    },

    /// The model answered one turn
    ResponseGenerated {
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The stream name observers subscribe to.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::CommandProposed { .. } => "logs",
            DomainEvent::CommandDecided { .. } => "command:decided",
            DomainEvent::ChatResponse { .. } => "chat:response",
            DomainEvent::WorkStatusChanged { .. } => "work:status",
            DomainEvent::ResponseGenerated { .. } => "model:response",
            DomainEvent::ToolExecuted { .. } => "tool:executed",
            DomainEvent::ErrorOccurred { .. } => "error",
        }
    }

    /// The payload delivered alongside [`DomainEvent::name`].
    pub fn payload(&self) -> serde_json::Value {
        match self {
            DomainEvent::CommandProposed { command_id, command, .. } => {
                serde_json::json!({ "data": command, "id": command_id })
            }
            DomainEvent::ChatResponse { message_id, response, status, timestamp } => {
                serde_json::json!({
                    "message_id": message_id,
                    "response": response,
                    "status": status,
                    "replied": timestamp,
                })
            }
            other => serde_json::to_value(other).unwrap_or_default(),
        }
    }
}

/// The EventSink seam: anything that can take a published event.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow
/// subscribers lag and lose events; publishers never wait.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::CommandProposed {
            command_id: "cmd-1".into(),
            command: "aws s3 ls".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "logs");
        match event.as_ref() {
            DomainEvent::CommandProposed { command_id, command, .. } => {
                assert_eq!(command_id, "cmd-1");
                assert_eq!(command, "aws s3 ls");
            }
            _ => panic!("Expected CommandProposed event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn command_proposed_payload_carries_text_and_id() {
        let event = DomainEvent::CommandProposed {
            command_id: "cmd-9".into(),
            command: "aws ec2 describe-instances".into(),
            timestamp: Utc::now(),
        };
        let payload = event.payload();
        assert_eq!(payload["id"], "cmd-9");
        assert_eq!(payload["data"], "aws ec2 describe-instances");
    }

    #[test]
    fn work_status_event_serializes_with_tag() {
        let event = DomainEvent::WorkStatusChanged {
            work_id: "w1".into(),
            kind: WorkKind::Scan,
            status: WorkStatus::Completed,
            timestamp: Utc::now(),
        };
        assert_eq!(event.name(), "work:status");
        let payload = event.payload();
        assert_eq!(payload["type"], "work_status_changed");
        assert_eq!(payload["status"], "completed");
        assert_eq!(payload["kind"], "scan");
    }
}
