//! Configuration system for Toolrelay.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Environment variable read when no API key is configured explicitly.
pub const DEFAULT_OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Main configuration struct for Toolrelay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Agent limits
    pub limits: LimitsConfig,
    /// Provider configurations
    pub providers: ProvidersConfig,
    /// MCP tool servers to connect to, in order
    pub servers: Vec<McpServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            limits: LimitsConfig::default(),
            providers: ProvidersConfig::default(),
            servers: vec![
                McpServerConfig::new("stocks", "http://127.0.0.1:3000/sse"),
                McpServerConfig::new("news", "http://127.0.0.1:3001/sse"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Model to use
    pub model: String,
    /// Provider backing the agent
    pub provider: String,
    /// Optional system prompt for the agent
    pub system_prompt: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            provider: "openai".to_string(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum tokens per response
    pub max_tokens: u32,
    /// Maximum model turns per query
    pub max_turns: usize,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            max_turns: 25,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI configuration
    pub openai: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (can be set directly or via environment)
    pub api_key: Option<String>,
    /// Environment variable name for API key
    pub api_key_env: Option<String>,
    /// Default model for this provider
    pub default_model: Option<String>,
    /// Base URL (optional, for compatible endpoints)
    pub base_url: Option<String>,
    /// Organization ID
    pub organization: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key from the direct value, the configured environment
    /// variable, or `OPENAI_API_KEY`, in that order.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        let env_var = self.api_key_env.as_deref().unwrap_or(DEFAULT_OPENAI_KEY_ENV);
        std::env::var(env_var).ok().filter(|k| !k.is_empty())
    }
}

/// Configuration for one MCP tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique server name.
    pub name: String,
    /// Streaming HTTP endpoint URL.
    pub url: String,
    /// Whether this server is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra HTTP headers sent with every request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl McpServerConfig {
    /// Create a new server configuration.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            headers: BTreeMap::new(),
        }
    }

    /// Add an HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set whether the server is enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Derive a server name from a bare URL (`host:port`).
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = url
            .split("://")
            .nth(1)
            .unwrap_or(&url)
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self::new(name, url)
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Error).collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Warning).collect()
    }

    /// Add an error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "limits.max_tokens")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// The layered configuration sources, lowest priority first.
    pub fn figment(extra_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            .merge(Toml::file("toolrelay.toml"));

        if let Some(path) = extra_file {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("TOOLRELAY_").split("__"))
    }

    /// Load configuration from all sources.
    pub fn load(extra_file: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(extra_file).extract()
    }

    /// Load and validate configuration.
    pub fn load_validated(extra_file: Option<&Path>) -> Result<Self, Error> {
        let config = Self::load(extra_file).map_err(|e| Error::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Validate, logging warnings and failing on errors.
    pub fn check(&self) -> Result<(), Error> {
        let result = self.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Validation(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.general.model.is_empty() {
            result.add_error("general.model", "Model name cannot be empty");
        }

        if self.general.provider != "openai" {
            result.add_error(
                "general.provider",
                format!("Unsupported provider '{}'. Valid values: [\"openai\"]", self.general.provider),
            );
        }

        if self.limits.max_tokens == 0 {
            result.add_error("limits.max_tokens", "max_tokens must be greater than 0");
        }

        if self.limits.max_turns == 0 {
            result.add_error("limits.max_turns", "max_turns must be greater than 0");
        }

        if !(0.0..=2.0).contains(&self.limits.temperature) {
            result.add_warning("limits.temperature", "temperature outside 0.0-2.0 will likely be rejected");
        }

        if let Some(ref openai) = self.providers.openai {
            if openai.api_key.as_ref().map(|k| k.is_empty()).unwrap_or(false) {
                result.add_warning("providers.openai.api_key", "API key is empty string");
            }
            if let Some(ref base_url) = openai.base_url {
                if !is_http_url(base_url) {
                    result.add_error(
                        "providers.openai.base_url",
                        "base_url must start with http:// or https://",
                    );
                }
            }
        }

        let mut seen = HashSet::new();
        for (i, server) in self.servers.iter().enumerate() {
            let field = format!("servers[{}]", i);
            if server.name.is_empty() {
                result.add_error(format!("{}.name", field), "Server name cannot be empty");
            } else if !seen.insert(server.name.as_str()) {
                result.add_error(
                    format!("{}.name", field),
                    format!("Duplicate server name '{}'", server.name),
                );
            }
            if !is_http_url(&server.url) {
                result.add_error(format!("{}.url", field), "url must start with http:// or https://");
            }
        }

        if !self.servers.iter().any(|s| s.enabled) {
            result.add_warning("servers", "No enabled MCP servers configured");
        }

        result
    }

    /// Enabled servers, in configured order.
    pub fn enabled_servers(&self) -> Vec<McpServerConfig> {
        self.servers.iter().filter(|s| s.enabled).cloned().collect()
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("toolrelay"))
            .unwrap_or_else(|| PathBuf::from("~/.config/toolrelay"))
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
