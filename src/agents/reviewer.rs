//! Reviewer agent: topic and draft to improved summary

use super::parse::parse_review_input;
use super::{complete_text, AgentApp, ModelSettings, TextResponder};
use crate::a2a::protocol::AgentSkill;
use crate::error::{AgentError, AgentResult};
use crate::service::runtime::RuntimeHolder;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, Instrument};

pub const REVIEWER_SYSTEM_PROMPT: &str = "You are a careful reviewer. Improve the draft summary for clarity, correctness, and concision. \
Fix grammar, remove redundancy, and keep it faithful to the topic. \
Return only the improved summary text; do not add commentary.";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReviewRequest {
    /// The topic of the summary (1-4000 characters)
    #[schemars(length(min = 1, max = 4000))]
    pub topic: String,
    /// The draft summary to review (1-20000 characters)
    #[schemars(length(min = 1, max = 20000))]
    pub draft: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewResponse {
    /// The improved summary text
    pub reviewed: String,
    /// Whether any changes were made to the draft
    pub changes_made: bool,
}

pub fn reviewer_user_prompt(topic: &str, draft: &str) -> String {
    format!("Topic: {topic}\n\nDraft summary:\n{draft}\n\nProduce the improved summary now.")
}

#[derive(Clone)]
pub struct ReviewerAgent {
    runtime: Arc<RuntimeHolder>,
    settings: ModelSettings,
}

impl ReviewerAgent {
    pub fn new(runtime: Arc<RuntimeHolder>, settings: ModelSettings) -> Self {
        Self { runtime, settings }
    }

    /// Improved draft text
    pub async fn review_draft(&self, topic: &str, draft: &str) -> AgentResult<String> {
        complete_text(
            &self.runtime,
            &self.settings,
            REVIEWER_SYSTEM_PROMPT,
            reviewer_user_prompt(topic, draft),
        )
        .instrument(crate::invoke_span!(
            agent = "reviewer",
            topic_len = topic.len(),
            draft_len = draft.len()
        ))
        .await
    }

    /// Improved draft plus whether it differs from the trimmed input draft
    pub async fn review(&self, topic: &str, draft: &str) -> AgentResult<ReviewResponse> {
        let reviewed = self.review_draft(topic, draft).await?;
        let changes_made = reviewed != draft.trim();
        Ok(ReviewResponse {
            reviewed,
            changes_made,
        })
    }
}

#[async_trait]
impl TextResponder for ReviewerAgent {
    async fn respond_text(&self, text: &str, _context_id: &str) -> AgentResult<String> {
        if text.trim().is_empty() {
            return Err(AgentError::invalid_input("message has no text"));
        }
        let input = parse_review_input(text);
        debug!(form = ?input.form, "Parsed reviewer input");
        self.review_draft(&input.topic, &input.draft).await
    }
}

#[async_trait]
impl AgentApp for ReviewerAgent {
    type Request = ReviewRequest;
    type Response = ReviewResponse;

    fn skill(&self) -> AgentSkill {
        AgentSkill {
            id: "review-summary".to_string(),
            name: "Review summary".to_string(),
            description: "Reviews and improves a draft summary for clarity and correctness."
                .to_string(),
            tags: vec![
                "review".to_string(),
                "editing".to_string(),
                "summarization".to_string(),
            ],
        }
    }

    async fn invoke(&self, request: ReviewRequest) -> AgentResult<ReviewResponse> {
        self.review(&request.topic, &request.draft).await
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ReviewSummaryTool {
            agent: self.clone(),
        })]
    }
}

/// `review_summary` MCP tool
pub struct ReviewSummaryTool {
    agent: ReviewerAgent,
}

impl ReviewSummaryTool {
    pub const NAME: &'static str = "review_summary";
}

#[async_trait]
impl Tool for ReviewSummaryTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: Self::NAME.to_string(),
            description: "Reviews and improves a draft summary for clarity and correctness. \
Fixes grammar, removes redundancy, and keeps the content faithful to the topic."
                .to_string(),
            parameters: serde_json::to_value(schemars::schema_for!(ReviewRequest))
                .unwrap_or(Value::Null),
            output_schema: serde_json::to_value(schemars::schema_for!(ReviewResponse)).ok(),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let request: ReviewRequest = serde_json::from_value(parameters.clone())
            .map_err(|e| ToolError::ValidationError(e.to_string()))?;

        let response = self.agent.review(&request.topic, &request.draft).await?;

        serde_json::to_value(response).map_err(|e| ToolError::ExecutionError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::runtime::AgentRuntime;
    use crate::testing::mocks::{MockCredential, MockLlmProvider};
    use serde_json::json;
    use std::time::Duration;

    fn reviewer_with(provider: Arc<MockLlmProvider>) -> ReviewerAgent {
        let runtime = AgentRuntime::new(
            Arc::new(MockCredential::new(chrono::Duration::minutes(10))),
            provider,
        );
        ReviewerAgent::new(
            Arc::new(RuntimeHolder::with_runtime(runtime)),
            ModelSettings {
                deployment: "test-deployment".to_string(),
                max_tokens: 500,
                temperature: 0.2,
                timeout: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test]
    async fn test_unchanged_draft_reports_no_changes() {
        let reviewer = reviewer_with(Arc::new(MockLlmProvider::single_response(
            "The draft text.",
        )));
        let response = reviewer.review("topic", "  The draft text.\n").await.unwrap();
        assert_eq!(response.reviewed, "The draft text.");
        assert!(!response.changes_made);
    }

    #[tokio::test]
    async fn test_changed_draft_reports_changes() {
        let reviewer = reviewer_with(Arc::new(MockLlmProvider::single_response(
            "A better draft.",
        )));
        let response = reviewer.review("topic", "a draft").await.unwrap();
        assert!(response.changes_made);
    }

    #[tokio::test]
    async fn test_prompt_wording() {
        let provider = Arc::new(MockLlmProvider::single_response("ok"));
        let reviewer = reviewer_with(provider.clone());
        reviewer.review("Tides", "The moon.").await.unwrap();

        let requests = provider.recorded_requests().await;
        assert_eq!(requests[0].messages[0].content, REVIEWER_SYSTEM_PROMPT);
        assert_eq!(
            requests[0].messages[1].content,
            "Topic: Tides\n\nDraft summary:\nThe moon.\n\nProduce the improved summary now."
        );
        assert_eq!(requests[0].max_tokens, Some(500));
    }

    #[tokio::test]
    async fn test_text_responder_parses_labeled_input() {
        let provider = Arc::new(MockLlmProvider::single_response("ok"));
        let reviewer = reviewer_with(provider.clone());
        reviewer
            .respond_text("Topic: Tides\nDraft: The moon.", "ctx")
            .await
            .unwrap();

        let requests = provider.recorded_requests().await;
        assert!(requests[0].messages[1]
            .content
            .starts_with("Topic: Tides\n\nDraft summary:\nThe moon."));
    }

    #[tokio::test]
    async fn test_tool_executes_review() {
        let reviewer = reviewer_with(Arc::new(MockLlmProvider::single_response("Better.")));
        let tool = &reviewer.tools()[0];

        let result = tool
            .execute(&json!({"topic": "t", "draft": "worse"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"reviewed": "Better.", "changes_made": true}));
    }

    #[tokio::test]
    async fn test_tool_propagates_responder_errors() {
        let reviewer = reviewer_with(Arc::new(MockLlmProvider::with_failure()));
        let tool = &reviewer.tools()[0];

        let result = tool.execute(&json!({"topic": "t", "draft": "d"})).await;
        assert!(matches!(
            result,
            Err(ToolError::Agent(AgentError::UpstreamFailure { .. }))
        ));
    }

    #[test]
    fn test_tool_schemas() {
        let reviewer = reviewer_with(Arc::new(MockLlmProvider::single_response("ok")));
        let description = reviewer.tools()[0].describe();

        assert_eq!(description.name, "review_summary");
        assert_eq!(description.parameters["properties"]["draft"]["maxLength"], 20000);
        let output = description.output_schema.unwrap();
        assert_eq!(output["properties"]["changes_made"]["type"], "boolean");
    }
}
