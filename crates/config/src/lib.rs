//! Configuration loading, validation, and management for taskloom.
//!
//! Loads configuration from `~/.taskloom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.taskloom/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the oracle endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible chat-completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per oracle response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Directory the file tools and the shell start in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Step loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Command session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Whole-run settings
    #[serde(default)]
    pub run: RunConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    4096
}

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
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("workspace_root", &self.workspace_root)
            .field("agent", &self.agent)
            .field("session", &self.session)
            .field("run", &self.run)
            .field("tools", &self.tools)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum think/act iterations per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Truncate each tool observation to this many characters
    #[serde(default = "default_max_observe", skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    /// Upper bound on retained conversation messages
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Repeats of the same assistant reply that count as "stuck"
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,
}

fn default_max_steps() -> u32 {
    20
}
fn default_max_observe() -> Option<usize> {
    Some(10_000)
}
fn default_max_messages() -> usize {
    100
}
fn default_duplicate_threshold() -> usize {
    2
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_observe: default_max_observe(),
            max_messages: default_max_messages(),
            duplicate_threshold: default_duplicate_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Shell executable
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Seconds a single command may run before the session times out
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,

    /// How often output is checked for the completion sentinel
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_shell() -> String {
    "/bin/bash".into()
}
fn default_session_timeout() -> u64 {
    120
}
fn default_poll_interval() -> u64 {
    200
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_secs: default_session_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Overall wall-clock limit for one run; 0 disables it
    #[serde(default = "default_run_timeout")]
    pub timeout_secs: u64,
}

fn default_run_timeout() -> u64 {
    3600
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_run_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Interpreter used by `python_execute`
    #[serde(default = "default_python")]
    pub python: String,

    /// Default timeout for `python_execute`
    #[serde(default = "default_python_timeout")]
    pub python_timeout_secs: u64,
}

fn default_python() -> String {
    "python3".into()
}
fn default_python_timeout() -> u64 {
    5
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            python_timeout_secs: default_python_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.taskloom/config.toml).
    ///
    /// Environment overrides:
    /// - `TASKLOOM_API_KEY`, then `OPENAI_API_KEY` (only if the file has no key)
    /// - `TASKLOOM_BASE_URL`
    /// - `TASKLOOM_MODEL`
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

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("TASKLOOM_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("TASKLOOM_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = lookup("TASKLOOM_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskloom")
    }

    /// The configured workspace root, or `~/.taskloom/workspace`.
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("workspace"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be > 0".into(),
            ));
        }
        if self.agent.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_messages must be > 0".into(),
            ));
        }
        if self.session.timeout_secs == 0 || self.session.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "session.timeout_secs and session.poll_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            workspace_root: None,
            agent: AgentConfig::default(),
            session: SessionConfig::default(),
            run: RunConfig::default(),
            tools: ToolsConfig::default(),
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

impl From<ConfigError> for taskloom_core::Error {
    fn from(err: ConfigError) -> Self {
        taskloom_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.max_messages, 100);
        assert_eq!(config.agent.duplicate_threshold, 2);
        assert_eq!(config.session.timeout_secs, 120);
        assert_eq!(config.session.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.run.timeout(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.agent.max_observe, Some(10_000));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            model = "local-llama"

            [agent]
            max_steps = 5

            [run]
            timeout_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(parsed.model, "local-llama");
        assert_eq!(parsed.agent.max_steps, 5);
        assert_eq!(parsed.agent.max_messages, 100);
        assert_eq!(parsed.session.shell, "/bin/bash");
        assert!(parsed.run.timeout().is_none());
    }

    #[test]
    fn invalid_values_rejected() {
        let hot = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(hot.validate().is_err());

        let mut no_steps = AppConfig::default();
        no_steps.agent.max_steps = 0;
        assert!(no_steps.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn load_from_file_and_reject_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        std::fs::write(&good, "max_tokens = 512\n[session]\ntimeout_secs = 30\n").unwrap();
        let config = AppConfig::load_from(&good).unwrap();
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.session.timeout_secs, 30);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "max_tokens = \"lots\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&bad),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("TASKLOOM_MODEL", "gpt-4o-mini"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.base_url, default_base_url());
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|k| (k == "TASKLOOM_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
