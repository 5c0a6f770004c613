//! Configuration loading, validation, and management for toolrelay.
//!
//! Loads configuration from `~/.toolrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolrelay_core::ExcessCallPolicy;

/// Upper bound accepted for `orchestrator.max_round_trips`.
pub const MAX_ROUND_TRIPS_LIMIT: u32 = 8;

/// Upper bound accepted for `orchestrator.request_timeout_secs` (one day).
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 86_400;

/// The root configuration structure.
///
/// Maps directly to `~/.toolrelay/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model backend API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model backend configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Outbound tool client configuration
    #[serde(default)]
    pub tool_client: ToolClientConfig,

    /// Demo tool server configuration
    #[serde(default)]
    pub tool_server: ToolServerConfig,

    /// Orchestration loop policy
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Redact a secret for Debug output.
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
            .field("model", &self.model)
            .field("tool_client", &self.tool_client)
            .field("tool_server", &self.tool_server)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for the first generation of a request
    #[serde(default = "default_initial_model")]
    pub initial_model: String,

    /// Model used once tool results are in the conversation
    #[serde(default = "default_followup_model")]
    pub followup_model: String,

    #[serde(default = "default_model_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_initial_model() -> String {
    "gemini-2.5-pro".into()
}
fn default_followup_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_model_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            initial_model: default_initial_model(),
            followup_model: default_followup_model(),
            request_timeout_secs: default_model_timeout(),
        }
    }
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolClientConfig {
    /// Base URL; tools are reached at `{base_url}/{tool_name}`
    #[serde(default = "default_tool_base_url")]
    pub base_url: String,

    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_tool_base_url() -> String {
    "http://localhost:8080".into()
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for ToolClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_tool_base_url(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

impl ToolClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Tool round-trips allowed per request
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: u32,

    /// What happens when the model asks for a tool past the limit
    #[serde(default)]
    pub on_excess_call: ExcessCallPolicy,

    /// Deadline shared by every network call of a request (0 = none)
    #[serde(default = "default_request_deadline")]
    pub request_timeout_secs: u64,
}

fn default_max_round_trips() -> u32 {
    1
}
fn default_request_deadline() -> u64 {
    300
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_round_trips: default_max_round_trips(),
            on_excess_call: ExcessCallPolicy::default(),
            request_timeout_secs: default_request_deadline(),
        }
    }
}

impl OrchestratorConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolrelay/config.toml).
    ///
    /// Environment overrides, applied after the file:
    /// - `TOOLRELAY_API_KEY`, then `GOOGLE_API_KEY` (only when the file has no
    ///   non-empty key; empty variables are skipped)
    /// - `TOOLRELAY_MODEL` (both models)
    /// - `TOOLRELAY_TOOL_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            let non_empty = |key: &str| lookup(key).filter(|k| !k.trim().is_empty());
            self.api_key = non_empty("TOOLRELAY_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY"));
        }

        if let Some(model) = lookup("TOOLRELAY_MODEL") {
            self.model.initial_model = model.clone();
            self.model.followup_model = model;
        }

        if let Some(url) = lookup("TOOLRELAY_TOOL_URL") {
            self.tool_client.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolrelay")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_ROUND_TRIPS_LIMIT).contains(&self.orchestrator.max_round_trips) {
            return Err(ConfigError::ValidationError(format!(
                "orchestrator.max_round_trips must be between 1 and {MAX_ROUND_TRIPS_LIMIT}"
            )));
        }

        if self.orchestrator.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(ConfigError::ValidationError(format!(
                "orchestrator.request_timeout_secs must be at most {MAX_REQUEST_TIMEOUT_SECS}"
            )));
        }

        if self.model.request_timeout_secs == 0 || self.tool_client.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "model.request_timeout_secs and tool_client.timeout_secs must be > 0".into(),
            ));
        }

        for (field, url) in [
            ("model.api_url", &self.model.api_url),
            ("tool_client.base_url", &self.tool_client.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "{field} must start with http:// or https://"
                )));
            }
        }

        Ok(())
    }

    /// The API key, or a startup error when none is configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelConfig::default(),
            tool_client: ToolClientConfig::default(),
            tool_server: ToolServerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
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

    #[error("No model API key configured (set TOOLRELAY_API_KEY or GOOGLE_API_KEY)")]
    MissingApiKey,
}
