//! Mock implementations for testing
//!
//! Provides mock LlmProvider, TokenCredential and AgentStep implementations so
//! agents, services and workflows can be tested without a hosted model, an
//! identity endpoint, or running peer agents.

use crate::auth::{AccessToken, CredentialError, TokenCredential};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::workflow::{AgentStep, WorkflowError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock LLM provider for testing
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub should_fail: bool,
    pub delay: Option<Duration>,
    pub close_fails: bool,
    pub closed: AtomicBool,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_close_failure(mut self) -> Self {
        self.close_fails = true;
        self
    }

    /// Every request received so far
    pub async fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let mut current = self.current_response.lock().await;
        let response_idx = *current % self.responses.len().max(1);
        *current += 1;

        let content = if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            self.responses[response_idx].clone()
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn close(&self) -> Result<(), LlmError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.close_fails {
            Err(LlmError::NetworkError("Mock close failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Mock credential issuing `mock-token-{n}` tokens
#[derive(Debug)]
pub struct MockCredential {
    pub lifetime: chrono::Duration,
    pub fail: bool,
    pub fetch_delay: Option<Duration>,
    pub fetches: AtomicUsize,
    pub closed: AtomicBool,
}

impl MockCredential {
    /// Tokens valid for `lifetime` from the moment they are issued
    pub fn new(lifetime: chrono::Duration) -> Self {
        Self {
            lifetime,
            fail: false,
            fetch_delay: None,
            fetches: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(chrono::Duration::minutes(10))
        }
    }

    /// Sleep inside every fetch, widening the window for concurrent callers
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenCredential for MockCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(CredentialError::Unavailable(
                "Mock credential failure".to_string(),
            ));
        }

        Ok(AccessToken {
            token: format!("mock-token-{n}"),
            expires_on: Utc::now() + self.lifetime,
        })
    }

    async fn close(&self) -> Result<(), CredentialError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

type StepFn = dyn Fn(&str) -> String + Send + Sync;

/// Workflow step answering with a function of its input, or always failing
pub struct MockAgentStep {
    id: String,
    name: String,
    respond: Option<Box<StepFn>>,
    failure: String,
    pub inputs: Mutex<Vec<String>>,
}

impl MockAgentStep {
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            respond: Some(Box::new(respond)),
            failure: String::new(),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            respond: None,
            failure: message.into(),
            inputs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AgentStep for MockAgentStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: &str) -> Result<String, WorkflowError> {
        self.inputs.lock().await.push(input.to_string());
        match &self.respond {
            Some(respond) => Ok(respond(input)),
            None => Err(WorkflowError::StepFailed {
                step: self.id.clone(),
                message: self.failure.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_llm_provider_cycles_responses() {
        let provider = MockLlmProvider::new(vec!["one".to_string(), "two".to_string()]);
        let request = CompletionRequest {
            messages: vec![],
            model: "m".to_string(),
            max_tokens: None,
            temperature: None,
            metadata: HashMap::new(),
        };

        let first = provider.complete(request.clone()).await.unwrap();
        let second = provider.complete(request.clone()).await.unwrap();
        let third = provider.complete(request).await.unwrap();

        assert_eq!(first.text(), "one");
        assert_eq!(second.text(), "two");
        assert_eq!(third.text(), "one");
        assert_eq!(provider.recorded_requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_mock_credential_counts_fetches() {
        let credential = MockCredential::new(chrono::Duration::minutes(5));
        let token = credential.get_token("scope").await.unwrap();

        assert_eq!(token.token, "mock-token-1");
        assert!(token.expires_on > Utc::now());
        assert_eq!(credential.fetch_count(), 1);
    }
}
