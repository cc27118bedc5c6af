//! A2A request handling for text agents

use super::protocol::{new_id, A2aError, Message, MessageSendParams, Role};
use crate::agents::TextResponder;
use crate::error::AgentError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn, Instrument};

/// Every operation of the A2A server surface
#[async_trait]
pub trait A2aRequestHandler: Send + Sync {
    async fn on_message_send(&self, params: MessageSendParams) -> Result<Message, A2aError>;

    async fn on_message_send_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<BoxStream<'static, Message>, A2aError>;

    async fn on_get_task(&self, task_id: &str) -> Result<Value, A2aError>;

    async fn on_cancel_task(&self, task_id: &str) -> Result<Value, A2aError>;

    async fn on_resubscribe_to_task(
        &self,
        task_id: &str,
    ) -> Result<BoxStream<'static, Message>, A2aError>;

    async fn on_set_task_push_notification_config(
        &self,
        task_id: &str,
        config: Value,
    ) -> Result<Value, A2aError>;

    async fn on_get_task_push_notification_config(
        &self,
        task_id: &str,
        config_id: &str,
    ) -> Result<Value, A2aError>;

    async fn on_list_task_push_notification_config(
        &self,
        task_id: &str,
    ) -> Result<Vec<Value>, A2aError>;

    async fn on_delete_task_push_notification_config(
        &self,
        task_id: &str,
        config_id: &str,
    ) -> Result<(), A2aError>;
}

/// Adapts a [`TextResponder`] to A2A
///
/// Messages are answered synchronously with a single agent message. Task
/// operations are not supported because no tasks are ever created.
pub struct TextA2aHandler {
    responder: Arc<dyn TextResponder>,
    include_error_details: bool,
}

impl TextA2aHandler {
    pub fn new(responder: Arc<dyn TextResponder>, include_error_details: bool) -> Self {
        Self {
            responder,
            include_error_details,
        }
    }

    /// Text sent back in place of an answer when the responder fails
    pub fn error_reply(&self, error: &AgentError) -> String {
        match error {
            AgentError::NotInitialized => warn!("A2A request before runtime initialization"),
            AgentError::InvalidInput { .. } => warn!("A2A request rejected: {}", error),
            AgentError::UpstreamTimeout
            | AgentError::UpstreamFailure { .. }
            | AgentError::UnsupportedOperation { .. }
            | AgentError::ConfigError(_) => error!("A2A agent handler error: {}", error),
        }

        if self.include_error_details {
            format!("Error: {}: {}", error.kind(), error.public_detail())
        } else {
            "Error: internal server error".to_string()
        }
    }

    async fn reply(&self, params: MessageSendParams) -> Message {
        let incoming = params.message;
        let context_id = incoming
            .context_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_id);
        let user_text = incoming.text_content();

        let response_text = match self.responder.respond_text(&user_text, &context_id).await {
            Ok(text) => text,
            Err(e) => self.error_reply(&e),
        };

        Message::text(Role::Agent, response_text, Some(context_id))
    }
}

#[async_trait]
impl A2aRequestHandler for TextA2aHandler {
    async fn on_message_send(&self, params: MessageSendParams) -> Result<Message, A2aError> {
        let span = crate::a2a_span!(
            operation = "message/send",
            message_id = %params.message.message_id,
            context_id = params.message.context_id.as_deref().unwrap_or("unknown")
        );
        Ok(self.reply(params).instrument(span).await)
    }

    async fn on_message_send_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<BoxStream<'static, Message>, A2aError> {
        let message = self.on_message_send(params).await?;
        Ok(stream::once(async move { message }).boxed())
    }

    async fn on_get_task(&self, _task_id: &str) -> Result<Value, A2aError> {
        Err(A2aError::unsupported_operation())
    }

    async fn on_cancel_task(&self, _task_id: &str) -> Result<Value, A2aError> {
        Err(A2aError::unsupported_operation())
    }

    async fn on_resubscribe_to_task(
        &self,
        _task_id: &str,
    ) -> Result<BoxStream<'static, Message>, A2aError> {
        Err(A2aError::unsupported_operation())
    }

    async fn on_set_task_push_notification_config(
        &self,
        _task_id: &str,
        _config: Value,
    ) -> Result<Value, A2aError> {
        Err(A2aError::unsupported_operation())
    }

    async fn on_get_task_push_notification_config(
        &self,
        _task_id: &str,
        _config_id: &str,
    ) -> Result<Value, A2aError> {
        Err(A2aError::unsupported_operation())
    }

    async fn on_list_task_push_notification_config(
        &self,
        _task_id: &str,
    ) -> Result<Vec<Value>, A2aError> {
        Err(A2aError::unsupported_operation())
    }

    async fn on_delete_task_push_notification_config(
        &self,
        _task_id: &str,
        _config_id: &str,
    ) -> Result<(), A2aError> {
        Err(A2aError::unsupported_operation())
    }
}
