//! The two agents and the contract every front-end drives them through
//!
//! Each agent is a core responder: it builds a fixed system and user prompt, makes
//! one bounded model call through the shared [`RuntimeHolder`], and returns the
//! trimmed text. Front-ends only see the [`AgentApp`] and [`TextResponder`] traits.

pub mod parse;
pub mod reviewer;
pub mod writer;

pub use parse::{parse_review_input, ReviewInput, ReviewInputForm};
pub use reviewer::{ReviewRequest, ReviewResponse, ReviewerAgent};
pub use writer::{WriteRequest, WriteResponse, WriterAgent};

use crate::a2a::protocol::AgentSkill;
use crate::config::ServiceConfig;
use crate::error::{AgentError, AgentResult};
use crate::llm::{CompletionRequest, Message};
use crate::service::runtime::RuntimeHolder;
use crate::tools::Tool;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-call model knobs
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub deployment: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ModelSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            deployment: config.model.deployment.clone().unwrap_or_default(),
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
            timeout: config.model_timeout(),
        }
    }
}

/// Plain text in, plain text out; the shape the A2A front-end needs
#[async_trait]
pub trait TextResponder: Send + Sync {
    async fn respond_text(&self, text: &str, context_id: &str) -> AgentResult<String>;
}

/// Everything a service process needs from an agent
#[async_trait]
pub trait AgentApp: TextResponder + 'static {
    /// Typed `/invoke` request; its derived JSON schema is enforced before `invoke`
    type Request: DeserializeOwned + JsonSchema + Send + 'static;
    type Response: Serialize + Send;

    /// Skill advertised in the agent card
    fn skill(&self) -> AgentSkill;

    async fn invoke(&self, request: Self::Request) -> AgentResult<Self::Response>;

    /// Tools exposed over MCP; none by default
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }
}

/// One bounded model call returning trimmed text
pub(crate) async fn complete_text(
    runtime: &RuntimeHolder,
    settings: &ModelSettings,
    system_prompt: &str,
    user_prompt: String,
) -> AgentResult<String> {
    let runtime = runtime.get().await?;

    let request = CompletionRequest {
        messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
        model: settings.deployment.clone(),
        max_tokens: Some(settings.max_tokens),
        temperature: Some(settings.temperature),
        metadata: HashMap::new(),
    };

    let started = Instant::now();
    match tokio::time::timeout(settings.timeout, runtime.client().complete(request)).await {
        Err(_) => {
            warn!(timeout_secs = settings.timeout.as_secs_f64(), "Model call timed out");
            Err(AgentError::UpstreamTimeout)
        }
        Ok(Err(e)) => {
            warn!("Model call failed: {}", e);
            Err(AgentError::upstream_failure(e.to_string()))
        }
        Ok(Ok(response)) => {
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                total_tokens = response.usage.total_tokens,
                "Model call succeeded"
            );
            Ok(response.text().trim().to_string())
        }
    }
}
