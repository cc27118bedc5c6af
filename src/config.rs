//! Configuration for the agent services and the workflow runner
//!
//! Settings come from three layers, later layers winning: built-in defaults for the
//! agent kind, an optional TOML file, and environment variables. Environment values
//! are trimmed and empty values count as unset.

use crate::auth::COGNITIVE_SERVICES_SCOPE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Which of the two agents a process hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Writer,
    Reviewer,
}

impl AgentKind {
    /// Prefix used by the per-agent environment variables (`WRITER_AGENT_NAME`, ...)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            AgentKind::Writer => "WRITER",
            AgentKind::Reviewer => "REVIEWER",
        }
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            AgentKind::Writer => "writer-agent",
            AgentKind::Reviewer => "reviewer-agent",
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            AgentKind::Writer => "Writes a short summary for a user-provided topic.",
            AgentKind::Reviewer => "Reviews and improves a writer draft for a given topic.",
        }
    }
}

impl FromStr for AgentKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "writer" => Ok(AgentKind::Writer),
            "reviewer" => Ok(AgentKind::Reviewer),
            other => Err(ConfigError::InvalidConfig(format!(
                "unknown agent kind '{other}' (expected writer or reviewer)"
            ))),
        }
    }
}

/// Complete configuration for one agent service process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub kind: AgentKind,
    pub service: ServiceSection,
    pub model: ModelSection,
    pub a2a: A2aSection,
    pub mcp: McpSection,
}

/// Identity and listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSection {
    /// Name reported by `/healthz`
    pub name: String,
    /// Display name advertised in the agent card and MCP server info
    pub agent_name: String,
    pub agent_description: String,
    pub host: String,
    pub port: u16,
}

/// Hosted model settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSection {
    /// Project or resource endpoint of the hosted model
    pub endpoint: Option<String>,
    /// Model deployment name
    pub deployment: Option<String>,
    /// API version query parameter sent with each chat completion
    pub api_version: String,
    /// Environment variable holding an API key; bearer tokens are used when unset
    pub api_key_env: String,
    /// Token scope requested from the credential when no API key is configured
    pub token_scope: String,
    pub timeout_secs: f64,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Messaging front-end settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct A2aSection {
    /// Public base URL used in the advertised agent card
    pub public_url: String,
    pub base_path: String,
    /// Include exception detail in textual error replies
    pub include_error_details: bool,
}

/// Tool front-end settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpSection {
    pub base_path: String,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render configuration: {0}")]
    TomlRender(#[from] toml::ser::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceConfig {
    /// Built-in defaults for an agent kind
    pub fn defaults(kind: AgentKind) -> Self {
        let (port, max_tokens, temperature) = match kind {
            AgentKind::Writer => (8000, 400, 0.3),
            AgentKind::Reviewer => (8001, 500, 0.2),
        };

        Self {
            kind,
            service: ServiceSection {
                name: kind.default_name().to_string(),
                agent_name: kind.default_name().to_string(),
                agent_description: kind.default_description().to_string(),
                host: "0.0.0.0".to_string(),
                port,
            },
            model: ModelSection {
                endpoint: None,
                deployment: None,
                api_version: "2024-10-21".to_string(),
                api_key_env: "AZURE_AI_API_KEY".to_string(),
                token_scope: COGNITIVE_SERVICES_SCOPE.to_string(),
                timeout_secs: 30.0,
                max_tokens,
                temperature,
            },
            a2a: A2aSection {
                public_url: "http://localhost".to_string(),
                base_path: "/a2a".to_string(),
                include_error_details: false,
            },
            mcp: McpSection {
                base_path: "/mcp".to_string(),
            },
        }
    }

    /// Load configuration: defaults, then the optional TOML file, then process environment
    pub fn load(kind: AgentKind, path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(kind, path)?,
            None => Self::defaults(kind),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file layered over the defaults for `kind`
    ///
    /// The file only needs to name the keys it changes.
    pub fn load_from_file(kind: AgentKind, path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)?;

        let mut base = toml::Value::try_from(Self::defaults(kind))?;
        merge_toml(&mut base, overlay);

        let mut config: ServiceConfig = base.try_into()?;
        config.kind = kind;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let prefix = self.kind.env_prefix();

        if let Some(v) = get("SERVICE_NAME") {
            self.service.name = v;
        }
        if let Some(v) = get(&format!("{prefix}_AGENT_NAME")) {
            self.service.agent_name = v;
        }
        if let Some(v) = get(&format!("{prefix}_AGENT_DESCRIPTION")) {
            self.service.agent_description = v;
        }
        if let Some(v) = get("HOST") {
            self.service.host = v;
        }
        if let Some(v) = get("PORT") {
            self.service.port = parse_value("PORT", &v)?;
        }

        if let Some(v) = get("AZURE_AI_PROJECT_ENDPOINT") {
            self.model.endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_AI_MODEL_DEPLOYMENT_NAME") {
            self.model.deployment = Some(v);
        }
        if let Some(v) = get("AZURE_AI_API_VERSION") {
            self.model.api_version = v;
        }
        if let Some(v) = get("AGENT_TIMEOUT_SECONDS") {
            self.model.timeout_secs = parse_value("AGENT_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("AGENT_MAX_TOKENS") {
            self.model.max_tokens = parse_value("AGENT_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("AGENT_TEMPERATURE") {
            self.model.temperature = parse_value("AGENT_TEMPERATURE", &v)?;
        }

        if let Some(v) = get("A2A_PUBLIC_URL") {
            self.a2a.public_url = v;
        }
        if let Some(v) = get("A2A_BASE_PATH") {
            self.a2a.base_path = v;
        }
        if let Some(v) = get("A2A_INCLUDE_ERROR_DETAILS") {
            self.a2a.include_error_details = parse_flag(&v);
        }
        if let Some(v) = get("MCP_BASE_PATH") {
            self.mcp.base_path = v;
        }

        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("a2a.base_path", &self.a2a.base_path),
            ("mcp.base_path", &self.mcp.base_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must start with '/', got '{path}'"
                )));
            }
        }

        timeout_from_secs("model.timeout_secs", self.model.timeout_secs)?;

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::InvalidValue {
                name: "model.temperature".to_string(),
                value: self.model.temperature.to_string(),
            });
        }

        Ok(())
    }

    /// Bounded wait applied to each model call
    pub fn model_timeout(&self) -> Duration {
        timeout_from_secs("model.timeout_secs", self.model.timeout_secs)
            .unwrap_or(Duration::from_secs(30))
    }

    /// API key from the configured environment variable, if any
    pub fn get_model_api_key(&self) -> Option<String> {
        std::env::var(&self.model.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Endpoint of the hosted model, required at runtime creation
    pub fn require_endpoint(&self) -> Result<&str, ConfigError> {
        self.model
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarNotFound("AZURE_AI_PROJECT_ENDPOINT".to_string()))
    }

    /// Deployment name of the hosted model, required at runtime creation
    pub fn require_deployment(&self) -> Result<&str, ConfigError> {
        self.model.deployment.as_deref().ok_or_else(|| {
            ConfigError::EnvVarNotFound("AZURE_AI_MODEL_DEPLOYMENT_NAME".to_string())
        })
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Workflow runner configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub writer_base_url: String,
    pub reviewer_base_url: String,
    /// OAuth scope for service-to-service bearer tokens; no auth header when unset
    pub auth_scope: Option<String>,
    pub http_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            writer_base_url: "http://localhost:8000/a2a".to_string(),
            reviewer_base_url: "http://localhost:8001/a2a".to_string(),
            auth_scope: None,
            http_timeout: Duration::from_secs(60),
        }
    }
}

impl WorkflowConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(v) = get("WRITER_A2A_BASE_URL") {
            config.writer_base_url = v;
        }
        if let Some(v) = get("REVIEWER_A2A_BASE_URL") {
            config.reviewer_base_url = v;
        }
        config.auth_scope = get("A2A_AUTH_SCOPE");
        if let Some(v) = get("WORKFLOW_HTTP_TIMEOUT_SECONDS") {
            let secs: f64 = parse_value("WORKFLOW_HTTP_TIMEOUT_SECONDS", &v)?;
            config.http_timeout = timeout_from_secs("WORKFLOW_HTTP_TIMEOUT_SECONDS", secs)?;
        }

        for (name, value) in [
            ("WRITER_A2A_BASE_URL", &config.writer_base_url),
            ("REVIEWER_A2A_BASE_URL", &config.reviewer_base_url),
        ] {
            url::Url::parse(value).map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: value.clone(),
            })?;
        }

        Ok(config)
    }
}

/// Truthy flag values accepted from the environment
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Longest accepted timeout, in seconds
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// Positive, finite timeout no longer than [`MAX_TIMEOUT_SECS`]
fn timeout_from_secs(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !(secs > 0.0 && secs <= MAX_TIMEOUT_SECS) {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: secs.to_string(),
        });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: secs.to_string(),
    })
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
