//! Error types for the CloudWarden domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all CloudWarden operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Command execution errors ---
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    // --- Mission submission errors ---
    #[error("Mission error: {0}")]
    Mission(#[from] MissionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the model backend. None of these are retried by the core.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Command {0} already processed")]
    AlreadyProcessed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Environment-level failures while preparing or spawning a command.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to spawn command: {0}")]
    Spawn(String),

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Command did not finish within {0} s and was stopped")]
    Expired(u64),

    #[error("Command queue unavailable: {0}")]
    Queue(#[from] StoreError),
}

/// Reasons a mission is refused before any work unit is created.
#[derive(Debug, Error)]
pub enum MissionError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Missing services")]
    MissingServices,

    #[error("Missing regions")]
    MissingRegions,

    #[error("Finding not found: {0}")]
    FindingNotFound(String),

    #[error("Finding already fixed: {0}")]
    FindingAlreadyFixed(String),

    #[error("Cannot fix without consent: {0}")]
    ConsentRequired(String),
}
