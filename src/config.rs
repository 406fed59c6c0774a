//! Configuration and settings management.
//!
//! Process-wide settings are loaded from layered configuration files and
//! environment variables; per-agent configuration is a YAML document.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default request timeout against the stack, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Process-wide settings loaded from configuration files and environment.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Hostname of the upstream stack (without protocol).
    #[serde(default = "default_stack_host")]
    pub stack_host: String,

    /// Port of the upstream stack. Kept as a string because environment
    /// sources deliver strings; parsed on demand.
    #[serde(default = "default_stack_port")]
    pub stack_port: String,

    /// API key sent to the stack. In-cluster deployments accept a dummy key;
    /// the security boundary is the network.
    #[serde(default = "default_stack_api_key")]
    pub stack_api_key: String,

    /// Directory holding `agents.yaml` and the optional `config.yaml`.
    #[serde(default = "default_agent_config_dir")]
    pub agent_config_dir: String,

    /// Agent served by the binary when none is named.
    pub default_agent: Option<String>,

    /// Safety shield model identifier. Shields are enabled only when both
    /// `safety_model` and `safety_url` are present.
    pub safety_model: Option<String>,

    /// Safety shield endpoint.
    pub safety_url: Option<String>,

    /// Emit a detailed diagnostic dump when a provider response yields no
    /// usable text. Off by default.
    #[serde(default)]
    pub show_empty_response_info: bool,
}

fn default_stack_host() -> String {
    "localhost".to_string()
}

fn default_stack_port() -> String {
    "8321".to_string()
}

fn default_stack_api_key() -> String {
    "dummy-key".to_string()
}

fn default_agent_config_dir() -> String {
    "config".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() maps UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Base URL of the upstream stack.
    #[must_use]
    pub fn base_url(&self) -> String {
        let port = self.stack_port.parse::<u16>().unwrap_or(8321);
        format!("http://{}:{}", self.stack_host, port)
    }

    /// True when the safety subsystem is configured (model and endpoint
    /// both present).
    #[must_use]
    pub fn shields_enabled(&self) -> bool {
        self.safety_model.as_deref().is_some_and(|m| !m.is_empty())
            && self.safety_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Errors raised while loading YAML configuration files.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid YAML for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// Process-wide YAML configuration (`config.yaml`). A missing file is
/// treated as empty.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GlobalConfig {
    /// Request timeout against the stack, in seconds.
    pub timeout: Option<f64>,
}

impl GlobalConfig {
    /// Load `config.yaml` from the agent configuration directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFileError` when the file exists but cannot be read or
    /// parsed. An absent file yields the defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigFileError> {
        let path = dir.join("config.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigFileError::Read {
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigFileError::Parse { path, source })
    }

    /// Effective timeout in whole seconds.
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        match self.timeout {
            Some(t) if t > 0.0 => t as u64,
            _ => DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Top-level shape of `agents.yaml`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AgentsFile {
    /// Configured agent entries, in file order.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl AgentsFile {
    /// Load and parse an agent configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFileError` when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Static configuration of one agent, as written in `agents.yaml`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AgentConfig {
    /// Unique agent name. Entries without a name are skipped at registry
    /// construction.
    pub name: Option<String>,
    /// Explicit model identifier; when absent the first available LLM model
    /// reported by the stack is used.
    pub model: Option<String>,
    /// Sampling parameter overrides.
    pub sampling_params: Option<SamplingParams>,
    /// System message prepended to every conversation.
    pub system_message: Option<String>,
    /// Knowledge bases searchable by this agent.
    #[serde(default)]
    pub knowledge_bases: Vec<String>,
    /// Remote tool servers this agent may delegate to.
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
    /// Shield models applied to incoming user content.
    #[serde(default)]
    pub input_shields: Vec<String>,
    /// Shield models applied to generated replies.
    #[serde(default)]
    pub output_shields: Vec<String>,
    /// Input shield categories to ignore (false-positive handling).
    #[serde(default)]
    pub ignored_input_shield_categories: Vec<String>,
    /// Output shield categories to ignore (false-positive handling).
    #[serde(default)]
    pub ignored_output_shield_categories: Vec<String>,
}

/// Sampling parameters block.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SamplingParams {
    /// Sampling strategy settings.
    pub strategy: Option<SamplingStrategy>,
}

/// Sampling strategy settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SamplingStrategy {
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// One remote tool server entry. Fields are optional because malformed
/// entries are skipped rather than rejected at parse time.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct McpServerConfig {
    /// Server label.
    pub name: Option<String>,
    /// Server endpoint.
    pub uri: Option<String>,
    /// Approval policy; defaults to `"never"` when unspecified.
    pub require_approval: Option<String>,
    /// Static allow-list of tool names exposed by this server.
    pub allowed_tools: Option<Vec<String>>,
}
