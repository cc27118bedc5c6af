//! Error taxonomy shared by every agent front-end
//!
//! Each variant maps to one HTTP status for the typed endpoint; the A2A and MCP
//! front-ends translate the same variants into their own reply shapes.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use warp::http::StatusCode;

/// Main error type for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("service not initialized")]
    NotInitialized,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("model call timed out")]
    UpstreamTimeout,

    #[error("model call failed: {message}")]
    UpstreamFailure { message: String },

    #[error("This operation is not supported: {operation}")]
    UnsupportedOperation { operation: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

impl AgentError {
    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create upstream failure error
    pub fn upstream_failure<S: Into<String>>(message: S) -> Self {
        Self::UpstreamFailure {
            message: message.into(),
        }
    }

    /// Create unsupported operation error
    pub fn unsupported<S: Into<String>>(operation: S) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// HTTP status used when the error reaches the typed `/invoke` endpoint
    pub fn status_code(&self) -> StatusCode {
        match self {
            AgentError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            AgentError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AgentError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            AgentError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            AgentError::UnsupportedOperation { .. } => StatusCode::NOT_IMPLEMENTED,
            AgentError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short stable name of the error kind, used in textual error replies
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::NotInitialized => "NotInitialized",
            AgentError::InvalidInput { .. } => "InvalidInput",
            AgentError::UpstreamTimeout => "UpstreamTimeout",
            AgentError::UpstreamFailure { .. } => "UpstreamFailure",
            AgentError::UnsupportedOperation { .. } => "UnsupportedOperation",
            AgentError::ConfigError(_) => "ConfigError",
        }
    }

    /// Client-facing detail string with secrets redacted
    pub fn public_detail(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("valid secret pattern")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.azure|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid path pattern")
});

const MAX_DETAIL_LEN: usize = 500;

/// Redact credentials and private paths from an error message and cap its length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_DETAIL_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_DETAIL_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
