//! Configuration loading, validation, and management for CloudWarden.
//!
//! Loads configuration from `~/.cloudwarden/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Settings an operator changes at runtime (model, turn budget, monitor mode)
//! live in the store, not here; see `cloudwarden_core::Settings`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.cloudwarden/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model backend API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model backend connection
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Where the SQLite database lives
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Command approval polling
    #[serde(default)]
    pub gate: GateConfig,

    /// Mission prompts and fixed turn budgets
    #[serde(default)]
    pub agent: AgentConfig,

    /// Known models, services, and regions
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Event bus sizing
    #[serde(default)]
    pub events: EventsConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("database", &self.database)
            .field("gate", &self.gate)
            .field("agent", &self.agent)
            .field("catalog", &self.catalog)
            .field("events", &self.events)
            .finish()
    }
}

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Cap on tokens per model response; the backend default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file; a leading `~/` expands to the home directory
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "~/.cloudwarden/cloudwarden.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl DatabaseConfig {
    /// The database path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.strip_prefix("~/") {
            Some(rest) => dirs_home().join(rest),
            None => PathBuf::from(&self.path),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// How often a waiting mission re-reads a pending command
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait ceiling before an undecided command times out
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// How long an approved command may run before it is killed
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_max_wait_secs() -> u64 {
    260
}
fn default_command_timeout_secs() -> u64 {
    300
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl GateConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Subject the chat assistant is restricted to
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Turn budget for the scan classification pass
    #[serde(default = "default_classify_max_turns")]
    pub classify_max_turns: u32,

    /// Turn budget for patch missions
    #[serde(default = "default_patch_max_turns")]
    pub patch_max_turns: u32,
}

fn default_topic() -> String {
    "Amazon Web Services (AWS)".into()
}
fn default_classify_max_turns() -> u32 {
    1
}
fn default_patch_max_turns() -> u32 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            classify_max_turns: default_classify_max_turns(),
            patch_max_turns: default_patch_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_services")]
    pub services: Vec<String>,

    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
}

fn default_models() -> Vec<String> {
    ["gpt-3.5-turbo", "gpt-4-turbo-preview"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_services() -> Vec<String> {
    [
        "ec2", "s3", "rds", "lambda", "dynamodb", "sqs", "sns", "ecs", "eks", "kms", "iam", "ebs",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_regions() -> Vec<String> {
    [
        "us-east-1",
        "us-west-1",
        "us-west-2",
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        "eu-central-1",
        "eu-north-1",
        "ap-south-1",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-southeast-1",
        "ap-southeast-2",
        "sa-east-1",
        "ca-central-1",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            services: default_services(),
            regions: default_regions(),
        }
    }
}

impl CatalogConfig {
    pub fn knows_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast buffer; lagging subscribers lose older events
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.cloudwarden/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `CLOUDWARDEN_API_KEY`, then `OPENAI_API_KEY` (only if no key in the file)
    /// - `CLOUDWARDEN_API_URL`
    /// - `CLOUDWARDEN_DB`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("CLOUDWARDEN_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(url) = lookup("CLOUDWARDEN_API_URL") {
            self.provider.api_url = url;
        }

        if let Some(path) = lookup("CLOUDWARDEN_DB") {
            self.database.path = path;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".cloudwarden")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.gate.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "gate.poll_interval_ms must be > 0".into(),
            ));
        }

        if self.gate.max_wait_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gate.max_wait_secs must be > 0".into(),
            ));
        }

        if self.gate.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gate.command_timeout_secs must be > 0".into(),
            ));
        }

        if self.provider.max_tokens == Some(0) {
            return Err(ConfigError::ValidationError(
                "provider.max_tokens must be > 0 when set".into(),
            ));
        }

        if self.agent.classify_max_turns == 0 || self.agent.patch_max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent turn budgets must be at least 1".into(),
            ));
        }

        if self.catalog.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "catalog.models must list at least one model".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
            gate: GateConfig::default(),
            agent: AgentConfig::default(),
            catalog: CatalogConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gate.max_wait(), Duration::from_secs(260));
        assert_eq!(config.gate.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.agent.patch_max_turns, 30);
        assert_eq!(config.agent.classify_max_turns, 1);
        assert_eq!(config.catalog.services.len(), 12);
        assert_eq!(config.catalog.regions.len(), 15);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.api_url, config.provider.api_url);
        assert_eq!(parsed.gate.max_wait_secs, config.gate.max_wait_secs);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut config = AppConfig::default();
        config.gate.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn zero_command_timeout_rejected() {
        let mut config = AppConfig::default();
        config.gate.command_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("command_timeout_secs"));
    }

    #[test]
    fn max_tokens_is_optional_but_positive() {
        let mut config = AppConfig::default();
        assert!(config.provider.max_tokens.is_none());
        config.provider.max_tokens = Some(0);
        assert!(config.validate().is_err());
        config.provider.max_tokens = Some(1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_model_catalog_rejected() {
        let mut config = AppConfig::default();
        config.catalog.models.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.provider.api_url, "https://api.openai.com/v1");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_key = "sk-test"

[gate]
max_wait_secs = 30

[catalog]
services = ["s3"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.gate.max_wait_secs, 30);
        assert_eq!(config.gate.poll_interval_ms, 1000);
        assert_eq!(config.gate.command_timeout(), Duration::from_secs(300));
        assert_eq!(config.catalog.services, vec!["s3".to_string()]);
        assert_eq!(config.catalog.regions.len(), 15);
    }

    #[test]
    fn invalid_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate\npoll_interval_ms = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-env"),
            ("CLOUDWARDEN_API_URL", "http://localhost:8080/v1"),
            ("CLOUDWARDEN_DB", "/var/lib/cloudwarden.db"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.provider.api_url, "http://localhost:8080/v1");
        assert_eq!(config.database.resolved_path(), PathBuf::from("/var/lib/cloudwarden.db"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("sk-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|key| (key == "CLOUDWARDEN_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-very-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn home_relative_database_path_expands() {
        let db = DatabaseConfig::default();
        let resolved = db.resolved_path();
        assert!(resolved.ends_with(".cloudwarden/cloudwarden.db"));
        assert!(!resolved.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("poll_interval_ms"));
        assert!(toml_str.contains("gpt-3.5-turbo"));
    }
}
