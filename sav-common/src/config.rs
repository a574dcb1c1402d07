//! Configuration loading and credential resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: every field has a compiled default,
//! so a fresh install starts with a warning instead of an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file path
pub const CONFIG_PATH_ENV: &str = "SAV_CONFIG";

/// Environment variable carrying the upstream inference API credential
pub const API_KEY_ENV: &str = "SAV_UPSTREAM_API_KEY";

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Top-level TOML configuration
///
/// ```toml
/// [upstream]
/// endpoint = "https://api.openai.com/v1/chat/completions"
/// model = "gpt-4o"
/// timeout_secs = 30
///
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 1000
///
/// [relay]
/// port = 5780
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream inference API settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UpstreamConfig {
    /// Chat-completions endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Multimodal model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API credential (prefer `SAV_UPSTREAM_API_KEY` over storing it here)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request transport timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retry settings for the valuation client
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RetrySettings {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay for each further attempt
    #[serde(default = "default_growth_factor")]
    pub growth_factor: u32,

    /// Upper bound for any single delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            growth_factor: default_growth_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    /// Reject settings the retry loop cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.growth_factor == 0 {
            return Err(Error::Config(
                "retry.growth_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Relay service settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Attempts the relay makes per request (1 = forward once, no retry)
    #[serde(default = "default_relay_max_attempts")]
    pub max_attempts: u32,

    /// Largest accepted request body; base64 photos run to several MB
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_attempts: default_relay_max_attempts(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_growth_factor() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_relay_max_attempts() -> u32 {
    1
}

/// 20 MiB
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields compiled defaults and a warning. A file that
    /// exists but cannot be read is an I/O error; one that cannot be parsed
    /// or fails validation is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file not found at {}, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;

        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.retry.validate()?;
        if config.relay.max_attempts == 0 {
            return Err(Error::Config(
                "relay.max_attempts must be at least 1".to_string(),
            ));
        }
        if config.relay.max_body_bytes == 0 {
            return Err(Error::Config(
                "relay.max_body_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Resolve the config file path
///
/// **Priority:** CLI argument → `SAV_CONFIG` → `<user config dir>/sav/config.toml`
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_config_path()
}

/// Platform config location: `~/.config/sav/config.toml` on Linux,
/// `~/Library/Application Support/sav/config.toml` on macOS,
/// `%APPDATA%\sav\config.toml` on Windows
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("sav").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("sav.toml"))
}

/// Resolve the upstream API credential
///
/// **Priority:** ENV → TOML
///
/// Blank values are skipped. If both sources carry a key the environment
/// wins and a warning is logged.
pub fn resolve_api_key(config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = config
        .upstream
        .api_key
        .as_ref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Upstream API key found in both environment and TOML. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("Upstream API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("Upstream API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "Upstream API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: [upstream] api_key = \"your-key\"",
        API_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.growth_factor, 2);
        assert_eq!(config.relay.max_attempts, 1);
        assert_eq!(config.relay.port, 5780);
        assert_eq!(config.relay.max_body_bytes, 20 * 1024 * 1024);
        assert_eq!(config.logging.level, "info");
        assert!(config.upstream.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.upstream.model, "gpt-4o");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = TomlConfig::from_toml_str("[retry]\nmax_attempts = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = TomlConfig::from_toml_str("[relay]\nmax_attempts = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = TomlConfig::from_toml_str("[relay]\nmax_body_bytes = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }
}
