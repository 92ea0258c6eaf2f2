//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Pattern matching and pause behaviour
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where to find the DevTools endpoint
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Shutdown settings
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Pause report output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Engine settings, frozen once a session starts
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Patterns to search for; each is also evaluated on pause
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    #[serde(default = "default_true")]
    pub case_sensitive: bool,

    /// Resume immediately after reporting a pause
    #[serde(default)]
    pub auto_resume: bool,

    /// Only search scripts whose url ends with `url_pattern`
    #[serde(default = "default_true")]
    pub js_files_only: bool,

    #[serde(default = "default_url_pattern")]
    pub url_pattern: String,

    /// Place a breakpoint on every occurrence in a line, not only the first
    #[serde(default)]
    pub all_occurrences: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            case_sensitive: true,
            auto_resume: false,
            js_files_only: true,
            url_pattern: default_url_pattern(),
            all_occurrences: false,
        }
    }
}

fn default_targets() -> Vec<String> {
    vec![DEFAULT_TARGET.to_string()]
}

fn default_true() -> bool {
    true
}

fn default_url_pattern() -> String {
    ".js".to_string()
}

/// Pattern used when none is configured
pub const DEFAULT_TARGET: &str = "location.search";

impl EngineConfig {
    /// Drop empty patterns and reject an empty pattern set
    pub fn validate(mut self) -> Result<Self> {
        self.targets.retain(|t| !t.is_empty());
        if self.targets.is_empty() {
            return Err(Error::Config("at least one non-empty target pattern is required".to_string()));
        }
        Ok(self)
    }

    /// Replace the pattern set from a pipe-delimited list
    pub fn set_targets_from(&mut self, list: &str) {
        self.targets = parse_targets(list);
    }
}

/// Split a pipe-delimited pattern list, dropping empty entries
pub fn parse_targets(list: &str) -> Vec<String> {
    list.split('|')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// DevTools endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Substring filter over target url and title
    #[serde(default)]
    pub target: Option<String>,

    /// Explicit WebSocket url, skips target discovery
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Timeout for establishing the connection only
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            target: None,
            ws_url: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ConnectionConfig {
    /// Base url of the DevTools HTTP endpoint
    pub fn http_endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9222
}
fn default_connect_timeout() -> u64 {
    10
}

/// Shutdown configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight handlers before teardown
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout(),
        }
    }
}

fn default_drain_timeout() -> u64 {
    500
}

/// Report format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
