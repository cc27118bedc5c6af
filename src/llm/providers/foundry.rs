//! Hosted model provider
//!
//! Calls a chat-completions deployment on the hosted model endpoint. Requests
//! authenticate with an `api-key` header when a key is configured and with a cached
//! bearer token otherwise.

use crate::auth::BearerTokenCache;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    MessageRole, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Hosted provider configuration
#[derive(Debug, Clone)]
pub struct FoundryConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub timeout: Duration,
}

/// How requests are authenticated
#[derive(Clone)]
pub enum FoundryAuth {
    ApiKey(String),
    Bearer(Arc<BearerTokenCache>),
}

impl std::fmt::Debug for FoundryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FoundryAuth::ApiKey(_) => f.write_str("ApiKey(***)"),
            FoundryAuth::Bearer(cache) => write!(f, "Bearer(scope={})", cache.scope()),
        }
    }
}

/// Chat-completions client for one model deployment
pub struct FoundryProvider {
    config: FoundryConfig,
    auth: FoundryAuth,
    client: Client,
}

impl FoundryProvider {
    pub fn new(config: FoundryConfig, auth: FoundryAuth) -> Result<Self, LlmError> {
        if config.endpoint.trim().is_empty() {
            return Err(LlmError::NotConfigured(
                "model endpoint is required".to_string(),
            ));
        }
        if config.deployment.trim().is_empty() {
            return Err(LlmError::NotConfigured(
                "model deployment name is required".to_string(),
            ));
        }
        if let FoundryAuth::ApiKey(key) = &auth {
            if key.is_empty() {
                return Err(LlmError::NotConfigured("API key is empty".to_string()));
            }
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            config,
            auth,
            client,
        })
    }

    /// Full chat-completions URL for the configured deployment (pure function)
    fn completions_url(config: &FoundryConfig) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.deployment,
            config.api_version
        )
    }

    /// Convert completion request to wire format (pure function)
    fn convert_request(request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn convert_message(message: &Message) -> ChatMessage {
        ChatMessage {
            role: match message.role {
                MessageRole::System => "system".to_string(),
                MessageRole::User => "user".to_string(),
                MessageRole::Assistant => "assistant".to_string(),
            },
            content: Some(message.content.clone()),
        }
    }

    /// Parse completion response (pure function)
    fn parse_completion_response(
        response: ChatCompletionResponse,
        fallback_model: &str,
        request_metadata: std::collections::HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices returned".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content,
            model: response
                .model
                .unwrap_or_else(|| fallback_model.to_string()),
            usage,
            finish_reason: Self::convert_finish_reason(choice.finish_reason.as_deref()),
            metadata: request_metadata,
        })
    }

    fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }

    /// Check if error should trigger retry (pure)
    fn should_retry(error: &LlmError) -> bool {
        match error {
            LlmError::NetworkError(_) | LlmError::RateLimitExceeded(_) => true,
            LlmError::ApiError(msg) => msg.contains("server error"),
            _ => false,
        }
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, LlmError> {
        match &self.auth {
            FoundryAuth::ApiKey(key) => Ok(request.header("api-key", key)),
            FoundryAuth::Bearer(cache) => {
                let header = cache
                    .authorization_header()
                    .await
                    .map_err(|e| LlmError::AuthenticationFailed(e.to_string()))?;
                Ok(request.header("Authorization", header))
            }
        }
    }

    /// Retry orchestrator - handles only I/O and retry logic (impure)
    async fn complete_with_retry(
        &self,
        body: ChatCompletionRequest,
        metadata: std::collections::HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let backoff_delays = [100u64, 200, 300];
        let mut last_error = None;

        for (attempt, &delay_ms) in std::iter::once(&0u64)
            .chain(backoff_delays.iter())
            .enumerate()
        {
            if attempt > 0 {
                debug!("Model retry attempt {} after {}ms delay", attempt, delay_ms);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.make_api_request(&body).await {
                Ok(response) => {
                    let response = Self::parse_completion_response(
                        response,
                        &self.config.deployment,
                        metadata,
                    )?;
                    debug!(
                        total_tokens = response.usage.total_tokens,
                        finish_reason = ?response.finish_reason,
                        retries = attempt,
                        "Model call completed"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Model request attempt {} failed: {}", attempt + 1, e);
                    if !Self::should_retry(&e) {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        error!("Model request failed after all retries");
        Err(last_error
            .unwrap_or_else(|| LlmError::NetworkError("All retry attempts failed".to_string())))
    }

    /// Make single API request (impure I/O)
    async fn make_api_request(
        &self,
        body: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let request = self
            .client
            .post(Self::completions_url(&self.config))
            .json(body);

        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| {
                LlmError::NetworkError(format!(
                    "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                ))
            })?;

        let status = response.status();

        if status.is_server_error() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "model server error: {status} - {error_text}"
            )));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    if let FoundryAuth::Bearer(cache) = &self.auth {
                        cache.invalidate().await;
                    }
                    LlmError::AuthenticationFailed(format!("{status} - {error_text}"))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    LlmError::RateLimitExceeded(format!("{status} - {error_text}"))
                }
                _ => LlmError::ApiError(format!("model API error: {status} - {error_text}")),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for FoundryProvider {
    fn name(&self) -> &str {
        "foundry"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(
            deployment = %self.config.deployment,
            messages = request.messages.len(),
            "Model request"
        );
        let body = Self::convert_request(&request);
        self.complete_with_retry(body, request.metadata).await
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if let FoundryAuth::Bearer(cache) = &self.auth {
            cache
                .token()
                .await
                .map_err(|e| LlmError::AuthenticationFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), LlmError> {
        debug!(deployment = %self.config.deployment, "Model client closed");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
