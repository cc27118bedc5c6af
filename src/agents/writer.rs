//! Writer agent: topic to short factual summary

use super::{complete_text, AgentApp, ModelSettings, TextResponder};
use crate::a2a::protocol::AgentSkill;
use crate::error::{AgentError, AgentResult};
use crate::service::runtime::RuntimeHolder;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

pub const WRITER_SYSTEM_PROMPT: &str = "You are a helpful writer. Produce a short, factual summary of the given topic. \
Keep it concise (roughly 6-10 sentences). Avoid speculation; if unsure, say so.";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WriteRequest {
    #[schemars(length(min = 1, max = 4000))]
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub summary: String,
}

pub fn writer_user_prompt(topic: &str) -> String {
    format!("Topic: {topic}\n\nWrite the summary now.")
}

#[derive(Clone)]
pub struct WriterAgent {
    runtime: Arc<RuntimeHolder>,
    settings: ModelSettings,
}

impl WriterAgent {
    pub fn new(runtime: Arc<RuntimeHolder>, settings: ModelSettings) -> Self {
        Self { runtime, settings }
    }

    pub async fn write_summary(&self, topic: &str) -> AgentResult<String> {
        complete_text(
            &self.runtime,
            &self.settings,
            WRITER_SYSTEM_PROMPT,
            writer_user_prompt(topic),
        )
        .instrument(crate::invoke_span!(agent = "writer", topic_len = topic.len()))
        .await
    }
}

#[async_trait]
impl TextResponder for WriterAgent {
    async fn respond_text(&self, text: &str, _context_id: &str) -> AgentResult<String> {
        let topic = text.trim();
        if topic.is_empty() {
            return Err(AgentError::invalid_input("message has no text"));
        }
        self.write_summary(topic).await
    }
}

#[async_trait]
impl AgentApp for WriterAgent {
    type Request = WriteRequest;
    type Response = WriteResponse;

    fn skill(&self) -> AgentSkill {
        AgentSkill {
            id: "write-summary".to_string(),
            name: "Write summary".to_string(),
            description: "Writes a short, factual summary for a topic.".to_string(),
            tags: vec!["writing".to_string(), "summarization".to_string()],
        }
    }

    async fn invoke(&self, request: WriteRequest) -> AgentResult<WriteResponse> {
        let summary = self.write_summary(&request.topic).await?;
        Ok(WriteResponse { summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;
    use crate::service::runtime::AgentRuntime;
    use crate::testing::mocks::{MockCredential, MockLlmProvider};
    use std::time::Duration;

    fn settings(timeout: Duration) -> ModelSettings {
        ModelSettings {
            deployment: "test-deployment".to_string(),
            max_tokens: 400,
            temperature: 0.3,
            timeout,
        }
    }

    fn writer_with(provider: Arc<MockLlmProvider>, timeout: Duration) -> WriterAgent {
        let runtime = AgentRuntime::new(
            Arc::new(MockCredential::new(chrono::Duration::minutes(10))),
            provider,
        );
        WriterAgent::new(
            Arc::new(RuntimeHolder::with_runtime(runtime)),
            settings(timeout),
        )
    }

    #[tokio::test]
    async fn test_summary_is_trimmed_and_prompt_is_fixed() {
        let provider = Arc::new(MockLlmProvider::single_response("  A summary.\n"));
        let writer = writer_with(provider.clone(), Duration::from_secs(5));

        let summary = writer.write_summary("Tides").await.unwrap();
        assert_eq!(summary, "A summary.");

        let requests = provider.recorded_requests().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[0].content, WRITER_SYSTEM_PROMPT);
        assert_eq!(
            request.messages[1].content,
            "Topic: Tides\n\nWrite the summary now."
        );
        assert_eq!(request.max_tokens, Some(400));
        assert_eq!(request.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_uninitialized_runtime() {
        let writer = WriterAgent::new(
            Arc::new(RuntimeHolder::new()),
            settings(Duration::from_secs(5)),
        );
        assert!(matches!(
            writer.write_summary("x").await,
            Err(AgentError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let provider =
            Arc::new(MockLlmProvider::single_response("late").with_delay(Duration::from_secs(5)));
        let writer = writer_with(provider, Duration::from_millis(50));

        assert!(matches!(
            writer.write_summary("x").await,
            Err(AgentError::UpstreamTimeout)
        ));
    }

    #[tokio::test]
    async fn test_model_failure_maps_to_upstream_failure() {
        let writer = writer_with(
            Arc::new(MockLlmProvider::with_failure()),
            Duration::from_secs(5),
        );
        let error = writer.write_summary("x").await.unwrap_err();
        assert!(matches!(error, AgentError::UpstreamFailure { .. }));
        assert!(error.to_string().starts_with("model call failed: "));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected_before_model_call() {
        let provider = Arc::new(MockLlmProvider::single_response("unused"));
        let writer = writer_with(provider.clone(), Duration::from_secs(5));

        let error = writer.respond_text(" \n\t", "ctx").await.unwrap_err();
        assert!(matches!(error, AgentError::InvalidInput { .. }));
        assert!(provider.recorded_requests().await.is_empty());
    }

    #[test]
    fn test_request_schema_bounds_topic() {
        let schema = serde_json::to_value(schemars::schema_for!(WriteRequest)).unwrap();
        assert_eq!(schema["properties"]["topic"]["minLength"], 1);
        assert_eq!(schema["properties"]["topic"]["maxLength"], 4000);
        assert_eq!(schema["required"], serde_json::json!(["topic"]));
    }
}
