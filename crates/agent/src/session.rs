//! Mission sessions — chat replies, scans, and patches.
//!
//! Every `submit_*` call validates its input, snapshots the current settings
//! and credentials, records the mission, and spawns it as an independent
//! tokio task. Missions never share state beyond the store, so a failure in
//! one (model down, unknown tool, budget exhausted) only fails that one.

use chrono::Utc;
use cloudwarden_config::AppConfig;
use cloudwarden_core::error::{Error, MissionError, StoreError};
use cloudwarden_core::event::{DomainEvent, EventSink};
use cloudwarden_core::message::{Conversation, Message};
use cloudwarden_core::provider::Provider;
use cloudwarden_core::settings::MissionSettings;
use cloudwarden_core::store::{
    ChatRecord, CommandDecision, CommandStatus, Credentials, Finding, PersistQueueStore, WorkKind, WorkStatus,
    finalize_work_unit,
};
use cloudwarden_core::tool::ToolRegistry;
use cloudwarden_security::{CommandExecutor, CommandGate, ExecutionPolicy, ShellRunner};
use cloudwarden_tools::{AwsCliTool, MarkSolutionTool, StoreFindingsTool};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::loop_runner::{AgentLoop, LoopOutcome};
use crate::prompts;

/// Fixed mission parameters that do not change at runtime.
#[derive(Debug, Clone)]
pub struct MissionOptions {
    /// Subject the chat assistant is restricted to
    pub topic: String,
    pub classify_max_turns: u32,
    pub patch_max_turns: u32,
    /// Approval wait ceiling per command
    pub max_wait: Duration,
}

impl MissionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            topic: config.agent.topic.clone(),
            classify_max_turns: config.agent.classify_max_turns,
            patch_max_turns: config.agent.patch_max_turns,
            max_wait: config.gate.max_wait(),
        }
    }
}

impl Default for MissionOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A mission that has been accepted and is running in the background.
#[derive(Debug)]
pub struct Submission {
    /// Work unit id, or chat message id for chat missions
    pub id: String,
    pub task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn PersistQueueStore>,
    events: Arc<dyn EventSink>,
    agent: Arc<AgentLoop>,
    executor: Arc<CommandExecutor>,
    options: MissionOptions,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn PersistQueueStore>,
        events: Arc<dyn EventSink>,
        agent: AgentLoop,
        executor: Arc<CommandExecutor>,
        options: MissionOptions,
    ) -> Self {
        Self {
            store,
            events,
            agent: Arc::new(agent),
            executor,
            options,
        }
    }

    /// Wire the gate, executor, and loop from configuration.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn PersistQueueStore>,
        events: Arc<dyn EventSink>,
        provider: Arc<dyn Provider>,
        runner: Arc<dyn ShellRunner>,
    ) -> Self {
        let gate = CommandGate::new(store.clone(), events.clone()).with_poll_interval(config.gate.poll_interval());
        let executor = Arc::new(
            CommandExecutor::new(Arc::new(gate), runner).with_run_timeout(config.gate.command_timeout()),
        );
        let mut agent = AgentLoop::new(provider, events.clone()).with_temperature(config.provider.temperature);
        if let Some(max_tokens) = config.provider.max_tokens {
            agent = agent.with_max_tokens(max_tokens);
        }
        Self::new(store, events, agent, executor, MissionOptions::from_config(config))
    }

    pub fn store(&self) -> &Arc<dyn PersistQueueStore> {
        &self.store
    }

    /// Answer an operator message in the context of the chat history.
    ///
    /// The reply is written to the chat record and published as a
    /// `chat:response` event when the mission ends.
    pub async fn submit_chat(&self, message: &str) -> Result<Submission, Error> {
        let message = message.trim();
        if message.is_empty() {
            return Err(MissionError::EmptyMessage.into());
        }

        let settings = self.store.get_settings().await?.snapshot();
        let credentials = self.store.get_credentials().await?;
        let history = self.store.get_chat_history().await?;
        let record = self.store.create_chat_message(message).await?;
        info!(message_id = %record.id, model = %settings.model, "Chat submitted");

        let conversation = chat_conversation(&self.options.topic, &history, message);
        let this = self.clone();
        let message_id = record.id.clone();
        let task = tokio::spawn(async move {
            this.run_chat(message_id, conversation, settings, credentials).await;
        });

        Ok(Submission { id: record.id, task })
    }

    /// Audit `services` across `regions`, then classify the report into findings.
    pub async fn submit_scan(&self, services: &[String], regions: &[String]) -> Result<Submission, Error> {
        let services = clean_list(services);
        if services.is_empty() {
            return Err(MissionError::MissingServices.into());
        }
        let regions = clean_list(regions);
        if regions.is_empty() {
            return Err(MissionError::MissingRegions.into());
        }

        let settings = self.store.get_settings().await?.snapshot();
        let credentials = self.store.get_credentials().await?;
        let unit = self
            .store
            .create_work_unit(WorkKind::Scan, json!({ "services": services, "regions": regions }))
            .await?;
        info!(work_id = %unit.id, services = ?services, regions = ?regions, "Scan submitted");

        let this = self.clone();
        let scan_id = unit.id.clone();
        let task = tokio::spawn(async move {
            this.run_scan(scan_id, services, regions, settings, credentials).await;
        });

        Ok(Submission { id: unit.id, task })
    }

    /// Remediate one finding the operator has consented to fix.
    pub async fn submit_patch(&self, finding_id: &str) -> Result<Submission, Error> {
        let finding = self
            .store
            .get_finding(finding_id)
            .await?
            .ok_or_else(|| MissionError::FindingNotFound(finding_id.to_string()))?;
        if finding.fixed {
            return Err(MissionError::FindingAlreadyFixed(finding.id).into());
        }
        if !finding.consent {
            return Err(MissionError::ConsentRequired(finding.id).into());
        }

        let settings = self
            .store
            .get_settings()
            .await?
            .snapshot()
            .with_max_turns(self.options.patch_max_turns);
        let credentials = self.store.get_credentials().await?;
        let unit = self
            .store
            .create_work_unit(WorkKind::Patch, json!({ "finding_id": finding.id }))
            .await?;
        info!(work_id = %unit.id, finding_id = %finding.id, "Patch submitted");

        let this = self.clone();
        let patch_id = unit.id.clone();
        let task = tokio::spawn(async move {
            this.run_patch(patch_id, finding, settings, credentials).await;
        });

        Ok(Submission { id: unit.id, task })
    }

    /// Status of a scan, patch, or chat mission.
    pub async fn get_status(&self, id: &str) -> Result<WorkStatus, Error> {
        if let Some(unit) = self.store.get_work_unit(id).await? {
            return Ok(unit.status);
        }
        if let Some(chat) = self.store.get_chat_message(id).await? {
            return Ok(chat.status);
        }
        Err(StoreError::NotFound {
            kind: "work unit",
            id: id.to_string(),
        }
        .into())
    }

    /// Accept or reject a pending command. Fails if it was already decided.
    pub async fn decide_command(&self, command_id: &str, decision: CommandDecision) -> Result<CommandStatus, Error> {
        Ok(self.executor.gate().decide(command_id, decision).await?)
    }

    fn aws_cli(&self, settings: &MissionSettings, credentials: Option<Credentials>) -> AwsCliTool {
        let policy = ExecutionPolicy {
            monitor_enabled: settings.monitor_enabled,
            max_wait: self.options.max_wait,
        };
        AwsCliTool::new(self.executor.clone(), credentials, policy)
    }

    async fn run_chat(
        &self,
        message_id: String,
        mut conversation: Conversation,
        settings: MissionSettings,
        credentials: Option<Credentials>,
    ) {
        match self.store.start_chat_message(&message_id).await {
            Ok(true) => debug!(message_id = %message_id, "Chat reply running"),
            Ok(false) => warn!(message_id = %message_id, "Chat message had already started"),
            Err(e) => warn!(message_id = %message_id, error = %e, "Failed to mark chat message running"),
        }

        let tools = ToolRegistry::new().with(Box::new(self.aws_cli(&settings, credentials)));

        let (response, status) = match self
            .agent
            .run(&mut conversation, &tools, &settings.model, settings.max_turns)
            .await
        {
            Ok(LoopOutcome::FinalAnswer(answer)) => (answer, WorkStatus::Completed),
            Ok(LoopOutcome::ToolCompleted { output, .. }) => (output, WorkStatus::Completed),
            Ok(LoopOutcome::BudgetExceeded { turns }) => {
                warn!(message_id = %message_id, turns, "Chat reply exhausted its turn budget");
                (prompts::CHAT_BUDGET_MESSAGE.to_string(), WorkStatus::Failed)
            }
            Err(e) => {
                self.report_failure("chat", &message_id, &e);
                (format!("Failed to generate a reply: {e}"), WorkStatus::Failed)
            }
        };

        match self.store.complete_chat_message(&message_id, &response, status).await {
            Ok(true) => info!(message_id = %message_id, status = %status, "Chat reply recorded"),
            Ok(false) => warn!(message_id = %message_id, "Chat message was already answered"),
            Err(e) => error!(message_id = %message_id, error = %e, "Failed to record chat reply"),
        }

        self.events.publish(DomainEvent::ChatResponse {
            message_id,
            response,
            status,
            timestamp: Utc::now(),
        });
    }

    async fn run_scan(
        &self,
        scan_id: String,
        services: Vec<String>,
        regions: Vec<String>,
        settings: MissionSettings,
        credentials: Option<Credentials>,
    ) {
        self.advance(&scan_id, WorkKind::Scan, WorkStatus::Running).await;

        let tools = ToolRegistry::new().with(Box::new(self.aws_cli(&settings, credentials)));
        let mut conversation =
            Conversation::seeded(prompts::scan_system_prompt(&services, &regions), prompts::SCAN_REQUEST);

        let report = match self
            .agent
            .run(&mut conversation, &tools, &settings.model, settings.max_turns)
            .await
        {
            Ok(LoopOutcome::FinalAnswer(report)) => report,
            Ok(LoopOutcome::ToolCompleted { output, .. }) => output,
            Ok(LoopOutcome::BudgetExceeded { turns }) => {
                warn!(work_id = %scan_id, turns, "Scan exhausted its turn budget, skipping classification");
                self.advance(&scan_id, WorkKind::Scan, WorkStatus::Failed).await;
                return;
            }
            Err(e) => {
                self.report_failure("scan", &scan_id, &e);
                self.advance(&scan_id, WorkKind::Scan, WorkStatus::Failed).await;
                return;
            }
        };

        self.classify(&scan_id, &report, &settings).await;
    }

    /// Second pass: turn the free-text report into stored findings.
    ///
    /// Only `store_findings` may complete the scan with findings. A pass that
    /// ends in free text means the model saw nothing worth recording.
    async fn classify(&self, scan_id: &str, report: &str, settings: &MissionSettings) {
        let tools = ToolRegistry::new().with(Box::new(StoreFindingsTool::new(
            self.store.clone(),
            self.events.clone(),
            scan_id,
        )));
        let mut conversation =
            Conversation::seeded(prompts::classify_system_prompt(report), prompts::CLASSIFY_REQUEST);

        match self
            .agent
            .run(&mut conversation, &tools, &settings.model, self.options.classify_max_turns)
            .await
        {
            Ok(LoopOutcome::ToolCompleted { output, .. }) => {
                info!(work_id = %scan_id, result = %output, "Scan classified");
            }
            Ok(LoopOutcome::FinalAnswer(_)) => {
                info!(work_id = %scan_id, "Classification found nothing to store");
                self.advance(scan_id, WorkKind::Scan, WorkStatus::Completed).await;
            }
            Ok(LoopOutcome::BudgetExceeded { turns }) => {
                warn!(work_id = %scan_id, turns, "Classification exhausted its turn budget");
                self.advance(scan_id, WorkKind::Scan, WorkStatus::Failed).await;
            }
            Err(e) => {
                self.report_failure("scan classification", scan_id, &e);
                self.advance(scan_id, WorkKind::Scan, WorkStatus::Failed).await;
            }
        }
    }

    async fn run_patch(
        &self,
        patch_id: String,
        finding: Finding,
        settings: MissionSettings,
        credentials: Option<Credentials>,
    ) {
        self.advance(&patch_id, WorkKind::Patch, WorkStatus::Running).await;

        let tools = ToolRegistry::new()
            .with(Box::new(self.aws_cli(&settings, credentials)))
            .with(Box::new(MarkSolutionTool::new(
                self.store.clone(),
                self.events.clone(),
                &patch_id,
                &finding.id,
            )));
        let mut conversation = Conversation::seeded(prompts::patch_system_prompt(), prompts::patch_request(&finding));

        match self
            .agent
            .run(&mut conversation, &tools, &settings.model, settings.max_turns)
            .await
        {
            Ok(LoopOutcome::ToolCompleted { .. }) => {
                info!(work_id = %patch_id, finding_id = %finding.id, "Patch finished");
            }
            Ok(LoopOutcome::FinalAnswer(_)) => {
                warn!(work_id = %patch_id, "Patch ended without recording a solution");
                self.advance(&patch_id, WorkKind::Patch, WorkStatus::Failed).await;
            }
            Ok(LoopOutcome::BudgetExceeded { turns }) => {
                warn!(work_id = %patch_id, turns, "Patch exhausted its turn budget");
                self.advance(&patch_id, WorkKind::Patch, WorkStatus::Failed).await;
            }
            Err(e) => {
                self.report_failure("patch", &patch_id, &e);
                self.advance(&patch_id, WorkKind::Patch, WorkStatus::Failed).await;
            }
        }
    }

    async fn advance(&self, id: &str, kind: WorkKind, status: WorkStatus) {
        if let Err(e) = finalize_work_unit(self.store.as_ref(), self.events.as_ref(), id, kind, status).await {
            error!(work_id = %id, status = %status, error = %e, "Failed to update work unit");
        }
    }

    fn report_failure(&self, context: &str, id: &str, err: &Error) {
        error!(work_id = %id, context, error = %err, "Mission failed");
        self.events.publish(DomainEvent::ErrorOccurred {
            context: format!("{context} {id}"),
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Rebuild the chat transcript: the system prompt, then each past turn as
/// its own system and user messages plus the reply if there was one, then
/// the new message.
fn chat_conversation(topic: &str, history: &[ChatRecord], message: &str) -> Conversation {
    let prompt = prompts::chat_system_prompt(topic);
    let mut conversation = Conversation::new();
    conversation.push(Message::system(&prompt));
    for past in history {
        conversation.push(Message::system(&prompt));
        conversation.push(Message::user(&past.user_message));
        if let Some(reply) = &past.ai_response {
            conversation.push(Message::assistant(reply));
        }
    }
    conversation.push(Message::user(message));
    conversation
}

/// Trim entries, drop blanks and duplicates, keep first-seen order.
fn clean_list(items: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !cleaned.iter().any(|c| c == item) {
            cleaned.push(item.to_string());
        }
    }
    cleaned
}
