//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use cloudwarden_core::error::StoreError;
use cloudwarden_core::settings::{Settings, SettingsPatch};
use cloudwarden_core::store::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    commands: Vec<PendingCommand>,
    work_units: Vec<WorkUnit>,
    findings: Vec<Finding>,
    chats: Vec<ChatRecord>,
    credentials: Option<Credentials>,
    settings: Settings,
}

/// A [`PersistQueueStore`] held entirely in process memory.
///
/// All writes take one lock, so the decide-once and monotonic-status checks
/// are atomic with the write they guard.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistQueueStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_pending_command(&self, command: &str) -> Result<PendingCommand, StoreError> {
        let pending = PendingCommand {
            id: Uuid::new_v4().to_string(),
            command: command.to_string(),
            status: CommandStatus::Pending,
            created_at: Utc::now(),
        };
        self.state.write().await.commands.push(pending.clone());
        Ok(pending)
    }

    async fn get_pending_command(&self, id: &str) -> Result<Option<PendingCommand>, StoreError> {
        let state = self.state.read().await;
        Ok(state.commands.iter().find(|c| c.id == id).cloned())
    }

    async fn set_pending_command_status(&self, id: &str, status: CommandStatus) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let command = state
            .commands
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "command",
                id: id.to_string(),
            })?;

        if command.status != CommandStatus::Pending {
            return Err(StoreError::AlreadyProcessed(id.to_string()));
        }
        command.status = status;
        Ok(())
    }

    async fn list_pending_commands(&self) -> Result<Vec<PendingCommand>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .commands
            .iter()
            .filter(|c| c.status == CommandStatus::Pending)
            .cloned()
            .collect())
    }

    async fn create_work_unit(&self, kind: WorkKind, payload: serde_json::Value) -> Result<WorkUnit, StoreError> {
        let now = Utc::now();
        let unit = WorkUnit {
            id: Uuid::new_v4().to_string(),
            kind,
            status: WorkStatus::Pending,
            payload,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.work_units.push(unit.clone());
        Ok(unit)
    }

    async fn get_work_unit(&self, id: &str) -> Result<Option<WorkUnit>, StoreError> {
        let state = self.state.read().await;
        Ok(state.work_units.iter().find(|w| w.id == id).cloned())
    }

    async fn set_work_unit_status(&self, id: &str, status: WorkStatus) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let unit = state
            .work_units
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "work unit",
                id: id.to_string(),
            })?;

        if !unit.status.can_transition_to(status) {
            return Ok(false);
        }
        unit.status = status;
        unit.updated_at = Utc::now();
        Ok(true)
    }

    async fn append_finding(&self, scan_id: &str, finding: NewFinding) -> Result<Finding, StoreError> {
        let stored = Finding::recorded(scan_id, finding);
        self.state.write().await.findings.push(stored.clone());
        Ok(stored)
    }

    async fn append_findings(&self, scan_id: &str, findings: Vec<NewFinding>) -> Result<Vec<Finding>, StoreError> {
        let stored: Vec<Finding> = findings.into_iter().map(|f| Finding::recorded(scan_id, f)).collect();
        self.state.write().await.findings.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn get_finding(&self, id: &str) -> Result<Option<Finding>, StoreError> {
        let state = self.state.read().await;
        Ok(state.findings.iter().find(|f| f.id == id).cloned())
    }

    async fn list_findings(&self) -> Result<Vec<Finding>, StoreError> {
        Ok(self.state.read().await.findings.clone())
    }

    async fn update_finding(&self, id: &str, update: FindingUpdate) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(finding) = state.findings.iter_mut().find(|f| f.id == id) else {
            return Ok(false);
        };

        if let Some(fixed) = update.fixed {
            finding.fixed = fixed;
        }
        if let Some(consent) = update.consent {
            finding.consent = consent;
        }
        if let Some(solution) = update.solution {
            finding.solution = Some(solution);
        }
        Ok(true)
    }

    async fn create_chat_message(&self, user_message: &str) -> Result<ChatRecord, StoreError> {
        let record = ChatRecord {
            id: Uuid::new_v4().to_string(),
            user_message: user_message.to_string(),
            ai_response: None,
            status: WorkStatus::Pending,
            created_at: Utc::now(),
            replied_at: None,
        };
        self.state.write().await.chats.push(record.clone());
        Ok(record)
    }

    async fn get_chat_message(&self, id: &str) -> Result<Option<ChatRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.chats.iter().find(|c| c.id == id).cloned())
    }

    async fn start_chat_message(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .chats
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "chat message",
                id: id.to_string(),
            })?;

        if record.status != WorkStatus::Pending {
            return Ok(false);
        }
        record.status = WorkStatus::Running;
        Ok(true)
    }

    async fn complete_chat_message(&self, id: &str, response: &str, status: WorkStatus) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .chats
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "chat message",
                id: id.to_string(),
            })?;

        if record.status.is_terminal() {
            return Ok(false);
        }
        record.ai_response = Some(response.to_string());
        record.status = status;
        record.replied_at = Some(Utc::now());
        Ok(true)
    }

    async fn get_chat_history(&self) -> Result<Vec<ChatRecord>, StoreError> {
        Ok(self.state.read().await.chats.clone())
    }

    async fn clear_chat_history(&self) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let removed = state.chats.len();
        state.chats.clear();
        Ok(removed)
    }

    async fn store_credentials(&self, credentials: Credentials) -> Result<(), StoreError> {
        self.state.write().await.credentials = Some(credentials);
        Ok(())
    }

    async fn get_credentials(&self) -> Result<Option<Credentials>, StoreError> {
        Ok(self.state.read().await.credentials.clone())
    }

    async fn get_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.state.read().await.settings.clone())
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        let mut state = self.state.write().await;
        state.settings = state.settings.clone().merged(patch);
        Ok(state.settings.clone())
    }
}
