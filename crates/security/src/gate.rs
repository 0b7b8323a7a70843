//! Command Gate — the approval wait between proposing a command and running it.
//!
//! A proposed command is queued as a pending record and announced on the
//! event sink. With monitor mode on, the caller then polls the record until
//! an approver accepts or rejects it, or the wait ceiling passes. Approvers
//! may live in another process; the store is the only channel between them.

use chrono::Utc;
use cloudwarden_core::error::StoreError;
use cloudwarden_core::event::{DomainEvent, EventSink};
use cloudwarden_core::store::{CommandDecision, CommandStatus, PersistQueueStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How an approval wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
    TimedOut,
}

pub struct CommandGate {
    store: Arc<dyn PersistQueueStore>,
    events: Arc<dyn EventSink>,
    poll_interval: Duration,
}

impl CommandGate {
    pub fn new(store: Arc<dyn PersistQueueStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            events,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Queue a command for approval and announce it. Returns the command id.
    ///
    /// The announcement goes out whether or not monitor mode is on, so a live
    /// log shows every command the agent runs.
    pub async fn submit(&self, command: &str) -> Result<String, StoreError> {
        let pending = self.store.create_pending_command(command).await?;

        info!(command_id = %pending.id, command = %command, "Command proposed");
        self.events.publish(DomainEvent::CommandProposed {
            command_id: pending.id.clone(),
            command: pending.command,
            timestamp: pending.created_at,
        });

        Ok(pending.id)
    }

    /// Wait for a decision on a submitted command.
    ///
    /// With `monitor_enabled` false this returns `Approved` at once without
    /// reading the store. Otherwise it re-reads the command every poll
    /// interval. Read failures are logged and polling continues; running
    /// out of time is `TimedOut`, never an error.
    pub async fn await_decision(&self, command_id: &str, monitor_enabled: bool, max_wait: Duration) -> Decision {
        if !monitor_enabled {
            debug!(command_id = %command_id, "Monitor mode off, auto-approving");
            return Decision::Approved;
        }

        let started = Instant::now();
        loop {
            match self.store.get_pending_command(command_id).await {
                Ok(Some(cmd)) => match cmd.status {
                    CommandStatus::Accepted => {
                        info!(command_id = %command_id, "Command approved");
                        return Decision::Approved;
                    }
                    CommandStatus::Rejected => {
                        warn!(command_id = %command_id, "Command rejected");
                        return Decision::Rejected;
                    }
                    CommandStatus::Pending => {}
                },
                Ok(None) => {
                    warn!(command_id = %command_id, "Pending command missing from store");
                }
                Err(e) => {
                    warn!(command_id = %command_id, error = %e, "Failed to read pending command, will retry");
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                warn!(command_id = %command_id, waited_secs = elapsed.as_secs(), "Approval wait timed out");
                return Decision::TimedOut;
            }

            tokio::time::sleep(self.poll_interval.min(max_wait - elapsed)).await;
        }
    }

    /// Record an approver's verdict.
    ///
    /// Fails with `AlreadyProcessed` if the command was already decided.
    pub async fn decide(&self, command_id: &str, decision: CommandDecision) -> Result<CommandStatus, StoreError> {
        let status = decision.status();
        self.store.set_pending_command_status(command_id, status).await?;

        info!(command_id = %command_id, status = %status, "Command decided");
        self.events.publish(DomainEvent::CommandDecided {
            command_id: command_id.to_string(),
            status,
            timestamp: Utc::now(),
        });

        Ok(status)
    }
}
