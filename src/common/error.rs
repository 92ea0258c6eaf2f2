//! Error types for autobreak
//!
//! Only connection errors are terminal. Everything that goes wrong inside a
//! running session is logged by the component that hit it and then dropped.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for autobreak
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Failed to reach DevTools endpoint at {endpoint}: {reason}. Is the browser running with --remote-debugging-port?")]
    DiscoveryFailed { endpoint: String, reason: String },

    #[error("No debuggable target found{}", filter_suffix(.filter))]
    NoTarget { filter: Option<String> },

    #[error("Failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("Connection attempt timed out after {0} seconds")]
    ConnectTimeout(u64),

    #[error("DevTools session is closed")]
    SessionClosed,

    // === Protocol Errors ===
    #[error("CDP protocol error: {0}")]
    Protocol(String),

    #[error("CDP request '{method}' failed ({code}): {message}")]
    RequestFailed {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Expression threw: {0}")]
    EvaluationThrew(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn filter_suffix(filter: &Option<String>) -> String {
    filter
        .as_ref()
        .map(|f| format!(" matching '{f}'"))
        .unwrap_or_default()
}

impl Error {
    /// Create a request failed error from a CDP error object
    pub fn request_failed(method: &str, code: i64, message: &str) -> Self {
        Self::RequestFailed {
            method: method.to_string(),
            code,
            message: message.to_string(),
        }
    }

    /// Create a discovery error
    pub fn discovery_failed(endpoint: &str, reason: impl ToString) -> Self {
        Self::DiscoveryFailed {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a connect error
    pub fn connect_failed(url: &str, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the remote rejected the request because the thing already exists
    ///
    /// The backend reports duplicate breakpoints (for example left behind by an
    /// earlier session) with this wording.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::RequestFailed { message, .. } => message.contains("already exists"),
            Self::Protocol(message) => message.contains("already exists"),
            _ => false,
        }
    }
}
