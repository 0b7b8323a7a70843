//! Subcommand implementations and the runtime they share.

pub mod approval;
pub mod chat;
pub mod connect;
pub mod findings;
pub mod init;
pub mod options;
pub mod patch;
pub mod scan;
pub mod settings;
pub mod status;

use cloudwarden_agent::{SessionManager, Submission};
use cloudwarden_config::AppConfig;
use cloudwarden_core::event::{DomainEvent, EventBus};
use cloudwarden_core::store::PersistQueueStore;
use cloudwarden_providers::OpenAiCompatProvider;
use cloudwarden_security::TokioShellRunner;
use cloudwarden_store::SqliteStore;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Config plus an open store; everything a command needs.
pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
}

impl Runtime {
    pub async fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        let path = config.database.resolved_path();
        let store = SqliteStore::open_file(&path)
            .await
            .map_err(|e| format!("Failed to open database at {}: {e}", path.display()))?;
        tracing::debug!(db = %path.display(), "Store opened");
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// Build a session manager wired to the model backend.
    ///
    /// The API key comes from config or the environment first, then from the
    /// key saved by `cloudwarden connect`.
    pub async fn sessions(&self, events: Arc<EventBus>) -> Result<SessionManager, Box<dyn std::error::Error>> {
        let mut config = self.config.clone();
        if !config.has_api_key() {
            config.api_key = self.store.get_credentials().await?.and_then(|c| c.model_api_key);
        }
        let provider = OpenAiCompatProvider::from_config(&config).map_err(|e| {
            format!("{e}. Set CLOUDWARDEN_API_KEY or run `cloudwarden connect --api-key ...`")
        })?;

        Ok(SessionManager::from_config(
            &config,
            self.store.clone(),
            events,
            Arc::new(provider),
            Arc::new(TokioShellRunner),
        ))
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::new(EventBus::new(self.config.events.capacity))
    }
}

/// Render one mission event as a live-log line, if it is worth showing.
pub fn render_event(event: &DomainEvent, monitor_mode: bool) -> Option<String> {
    match event {
        DomainEvent::CommandProposed { command_id, command, .. } => {
            let mut line = format!("  $ {command}");
            if monitor_mode {
                line.push_str(&format!(
                    "\n    waiting for approval: cloudwarden approve {command_id}  |  cloudwarden reject {command_id}"
                ));
            }
            Some(line)
        }
        DomainEvent::CommandDecided { command_id, status, .. } => Some(format!("    {command_id} {status}")),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => {
            let mark = if *success { "ok" } else { "failed" };
            Some(format!("    {tool_name} {mark} ({duration_ms} ms)"))
        }
        DomainEvent::WorkStatusChanged { work_id, kind, status, .. } => Some(format!("  {kind} {work_id}: {status}")),
        DomainEvent::ErrorOccurred {
            context, error_message, ..
        } => Some(format!("  [Error] {context}: {error_message}")),
        DomainEvent::ChatResponse { .. } | DomainEvent::ResponseGenerated { .. } => None,
    }
}

/// Wait for a mission to end while echoing its events to stderr.
///
/// `events` must be subscribed before the mission is submitted.
pub async fn wait_for(submission: Submission, events: Receiver<Arc<DomainEvent>>, monitor_mode: bool) -> CmdResult {
    follow_until_done(submission, events, monitor_mode, |line| eprintln!("{line}")).await
}

/// Feed every event the mission publishes to `emit`, including those still
/// buffered when its task ends.
pub async fn follow_until_done(
    submission: Submission,
    mut events: Receiver<Arc<DomainEvent>>,
    monitor_mode: bool,
    mut emit: impl FnMut(String),
) -> CmdResult {
    let mut task = submission.task;
    let joined = loop {
        tokio::select! {
            joined = &mut task => break joined,
            received = events.recv() => match received {
                Ok(event) => {
                    if let Some(line) = render_event(&event, monitor_mode) {
                        emit(line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => emit(format!("  (skipped {skipped} events)")),
                Err(RecvError::Closed) => break (&mut task).await,
            },
        }
    };

    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(line) = render_event(&event, monitor_mode) {
                    emit(line);
                }
            }
            Err(TryRecvError::Lagged(skipped)) => emit(format!("  (skipped {skipped} events)")),
            Err(_) => break,
        }
    }

    joined.map_err(|e| format!("Mission task failed: {e}"))?;
    Ok(())
}
