//! # CloudWarden Core
//!
//! Domain types, traits, and error definitions for the CloudWarden agent runtime.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Seams
//!
//! - [`Provider`] — the model backend, one request per agent turn
//! - [`Tool`] / [`ToolRegistry`] — schema-checked dispatch of tool calls
//! - [`PersistQueueStore`] — pending commands, work units, findings, chat
//! - [`EventSink`] — fire-and-forget notifications to observers

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod settings;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ExecutionError, MissionError, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus, EventSink};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use settings::{MissionSettings, Settings, SettingsPatch};
pub use store::{
    ChatRecord, CommandDecision, CommandStatus, Credentials, Finding, FindingUpdate, NewFinding,
    PendingCommand, PersistQueueStore, WorkKind, WorkStatus, WorkUnit, finalize_work_unit,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
