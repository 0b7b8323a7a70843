//! Persistence trait — pending commands, work units, findings, chat history.
//!
//! The store is the only state shared between an in-flight mission and the
//! outside world. Two rules are enforced here rather than by callers:
//! a pending command is decided at most once, and a work unit's terminal
//! status is written at most once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::event::{DomainEvent, EventSink};
use crate::settings::{Settings, SettingsPatch};

/// Approval state of a proposed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Accepted,
    Rejected,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Accepted => "accepted",
            CommandStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommandStatus::Pending),
            "accepted" => Ok(CommandStatus::Accepted),
            "rejected" => Ok(CommandStatus::Rejected),
            other => Err(StoreError::QueryFailed(format!("unknown command status '{other}'"))),
        }
    }
}

/// An approver's verdict on a pending command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandDecision {
    Accept,
    Reject,
}

impl CommandDecision {
    /// The status a decided command ends up in.
    pub fn status(self) -> CommandStatus {
        match self {
            CommandDecision::Accept => CommandStatus::Accepted,
            CommandDecision::Reject => CommandStatus::Rejected,
        }
    }
}

/// A command the agent wants to run, queued for approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCommand {
    pub id: String,
    pub command: String,
    pub status: CommandStatus,
    pub created_at: DateTime<Utc>,
}

/// What a work unit is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Scan,
    Patch,
}

impl WorkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkKind::Scan => "scan",
            WorkKind::Patch => "patch",
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" => Ok(WorkKind::Scan),
            "patch" => Ok(WorkKind::Patch),
            other => Err(StoreError::QueryFailed(format!("unknown work kind '{other}'"))),
        }
    }
}

/// Lifecycle of a work unit (and of a chat reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Running => "running",
            WorkStatus::Completed => "completed",
            WorkStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkStatus::Completed | WorkStatus::Failed)
    }

    /// Statuses a unit may be in for a move to `self` to be legal.
    ///
    /// Transitions are monotonic: nothing leaves a terminal status and
    /// nothing returns to `pending`.
    pub fn predecessors(&self) -> &'static [WorkStatus] {
        match self {
            WorkStatus::Pending => &[],
            WorkStatus::Running => &[WorkStatus::Pending],
            WorkStatus::Completed | WorkStatus::Failed => &[WorkStatus::Pending, WorkStatus::Running],
        }
    }

    pub fn can_transition_to(&self, next: WorkStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WorkStatus::Pending),
            "running" => Ok(WorkStatus::Running),
            "completed" => Ok(WorkStatus::Completed),
            "failed" => Ok(WorkStatus::Failed),
            other => Err(StoreError::QueryFailed(format!("unknown work status '{other}'"))),
        }
    }
}

/// A tracked scan or patch mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: String,
    pub kind: WorkKind,
    pub status: WorkStatus,
    /// Scan: `{services, regions}`. Patch: `{finding_id}`.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A classified finding as the model reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFinding {
    pub resource: String,
    pub resource_name: String,
    pub resource_arn: String,
    pub severity: String,
    pub message: String,
    pub issue: String,
    pub details: String,
}

/// A persisted security finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    /// The scan that produced this finding
    pub scan_id: String,
    pub resource: String,
    pub resource_name: String,
    pub resource_arn: String,
    pub severity: String,
    pub message: String,
    pub issue: String,
    pub details: String,
    pub fixed: bool,
    /// Operator consent to auto-remediate
    pub consent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    /// A fresh, unfixed finding for `scan_id` with a new id.
    pub fn recorded(scan_id: &str, finding: NewFinding) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scan_id: scan_id.to_string(),
            resource: finding.resource,
            resource_name: finding.resource_name,
            resource_arn: finding.resource_arn,
            severity: finding.severity,
            message: finding.message,
            issue: finding.issue,
            details: finding.details,
            fixed: false,
            consent: false,
            solution: None,
            created_at: Utc::now(),
        }
    }
}

/// Partial update of a finding; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingUpdate {
    pub fixed: Option<bool>,
    pub consent: Option<bool>,
    pub solution: Option<String>,
}

/// One operator message and the reply to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
    pub status: WorkStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replied_at: Option<DateTime<Utc>>,
}

/// Account credentials for the connected AWS account and the model backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub aws_region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_api_key: Option<String>,
}

impl Credentials {
    /// Values that must never reach logs or the model.
    pub fn secret_values(&self) -> Vec<&str> {
        let mut secrets = vec![self.aws_secret_key.as_str()];
        if let Some(token) = &self.aws_session_token {
            secrets.push(token.as_str());
        }
        if let Some(key) = &self.model_api_key {
            secrets.push(key.as_str());
        }
        secrets.retain(|s| !s.is_empty());
        secrets
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("aws_access_key", &self.aws_access_key)
            .field("aws_secret_key", &"[REDACTED]")
            .field("aws_region", &self.aws_region)
            .field("aws_session_token", &self.aws_session_token.as_ref().map(|_| "[REDACTED]"))
            .field("model_api_key", &self.model_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The PersistQueueStore seam.
///
/// Implementations: SQLite (durable, shared across processes) and in-memory
/// (tests and ephemeral runs).
#[async_trait]
pub trait PersistQueueStore: Send + Sync {
    /// Backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    // --- Pending commands ---

    /// Queue a command for approval with status `pending`.
    async fn create_pending_command(&self, command: &str) -> Result<PendingCommand, StoreError>;

    async fn get_pending_command(&self, id: &str) -> Result<Option<PendingCommand>, StoreError>;

    /// Move a command out of `pending`.
    ///
    /// Fails with `AlreadyProcessed` unless the command is still `pending`,
    /// and with `NotFound` for an unknown id.
    async fn set_pending_command_status(&self, id: &str, status: CommandStatus) -> Result<(), StoreError>;

    /// Commands still awaiting a decision, oldest first.
    async fn list_pending_commands(&self) -> Result<Vec<PendingCommand>, StoreError>;

    // --- Work units ---

    async fn create_work_unit(&self, kind: WorkKind, payload: serde_json::Value) -> Result<WorkUnit, StoreError>;

    async fn get_work_unit(&self, id: &str) -> Result<Option<WorkUnit>, StoreError>;

    /// Apply a monotonic status transition.
    ///
    /// Returns `Ok(false)` without writing when the transition is not legal
    /// (e.g. the unit is already terminal).
    async fn set_work_unit_status(&self, id: &str, status: WorkStatus) -> Result<bool, StoreError>;

    // --- Findings ---

    async fn append_finding(&self, scan_id: &str, finding: NewFinding) -> Result<Finding, StoreError>;

    /// Store a batch of findings for one scan: all of them, or none on error.
    async fn append_findings(&self, scan_id: &str, findings: Vec<NewFinding>) -> Result<Vec<Finding>, StoreError>;

    async fn get_finding(&self, id: &str) -> Result<Option<Finding>, StoreError>;

    async fn list_findings(&self) -> Result<Vec<Finding>, StoreError>;

    /// Returns `Ok(false)` when no finding has this id.
    async fn update_finding(&self, id: &str, update: FindingUpdate) -> Result<bool, StoreError>;

    // --- Chat ---

    async fn create_chat_message(&self, user_message: &str) -> Result<ChatRecord, StoreError>;

    async fn get_chat_message(&self, id: &str) -> Result<Option<ChatRecord>, StoreError>;

    /// Move a `pending` message to `running`. Returns `Ok(false)` if it had
    /// already left `pending`.
    async fn start_chat_message(&self, id: &str) -> Result<bool, StoreError>;

    /// Record the reply and final status. Returns `Ok(false)` if the message
    /// was already answered.
    async fn complete_chat_message(&self, id: &str, response: &str, status: WorkStatus) -> Result<bool, StoreError>;

    /// All chat records, oldest first.
    async fn get_chat_history(&self) -> Result<Vec<ChatRecord>, StoreError>;

    /// Delete all chat records, returning how many were removed.
    async fn clear_chat_history(&self) -> Result<usize, StoreError>;

    // --- Credentials & settings ---

    async fn store_credentials(&self, credentials: Credentials) -> Result<(), StoreError>;

    async fn get_credentials(&self) -> Result<Option<Credentials>, StoreError>;

    async fn get_settings(&self) -> Result<Settings, StoreError>;

    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StoreError>;
}

/// Move a work unit forward and announce the change.
///
/// Returns `Ok(false)` when the unit was already terminal (or past `status`);
/// nothing is published in that case.
pub async fn finalize_work_unit(
    store: &dyn PersistQueueStore,
    events: &dyn EventSink,
    id: &str,
    kind: WorkKind,
    status: WorkStatus,
) -> Result<bool, StoreError> {
    let changed = store.set_work_unit_status(id, status).await?;
    if changed {
        tracing::info!(work_id = %id, kind = %kind, status = %status, "Work unit status changed");
        events.publish(DomainEvent::WorkStatusChanged {
            work_id: id.to_string(),
            kind,
            status,
            timestamp: Utc::now(),
        });
    } else {
        tracing::debug!(work_id = %id, status = %status, "Work unit status unchanged");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_successors() {
        for terminal in [WorkStatus::Completed, WorkStatus::Failed] {
            for next in [WorkStatus::Pending, WorkStatus::Running, WorkStatus::Completed, WorkStatus::Failed] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn forward_transitions_allowed() {
        assert!(WorkStatus::Pending.can_transition_to(WorkStatus::Running));
        assert!(WorkStatus::Running.can_transition_to(WorkStatus::Completed));
        assert!(WorkStatus::Running.can_transition_to(WorkStatus::Failed));
        assert!(WorkStatus::Pending.can_transition_to(WorkStatus::Failed));
        assert!(!WorkStatus::Running.can_transition_to(WorkStatus::Pending));
    }

    #[test]
    fn status_strings_parse_back() {
        for status in [WorkStatus::Pending, WorkStatus::Running, WorkStatus::Completed, WorkStatus::Failed] {
            assert_eq!(status.as_str().parse::<WorkStatus>().unwrap(), status);
        }
        assert_eq!("accepted".parse::<CommandStatus>().unwrap(), CommandStatus::Accepted);
        assert!("maybe".parse::<CommandStatus>().is_err());
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(CommandDecision::Accept.status(), CommandStatus::Accepted);
        assert_eq!(CommandDecision::Reject.status(), CommandStatus::Rejected);
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let creds = Credentials {
            aws_access_key: "AKIAEXAMPLE".into(),
            aws_secret_key: "super-secret".into(),
            aws_region: "us-east-1".into(),
            aws_session_token: Some("token-value".into()),
            model_api_key: None,
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("token-value"));
        assert_eq!(creds.secret_values(), vec!["super-secret", "token-value"]);
    }
}
