//! A2A client used by the workflow to reach peer agents

use super::protocol::{join_url, AgentCard, Message, MessageSendParams, Role};
use crate::auth::{BearerTokenCache, CredentialError};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const AGENT_CARD_PATH: &str = ".well-known/agent-card.json";

#[derive(Debug, Error)]
pub enum A2aClientError {
    #[error("Failed to connect to agent at {url}: {message}")]
    Connection { url: String, message: String },
    #[error("Agent at {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
    #[error("Authorization failed: {0}")]
    Auth(#[from] CredentialError),
}

/// HTTP client shared by every peer agent in a workflow
#[derive(Clone)]
pub struct A2aClient {
    http: Client,
    auth: Option<Arc<BearerTokenCache>>,
}

impl A2aClient {
    pub fn new(timeout: Duration, auth: Option<Arc<BearerTokenCache>>) -> Result<Self, A2aClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| A2aClientError::Connection {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { http, auth })
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, A2aClientError> {
        match &self.auth {
            Some(cache) => Ok(request.header("Authorization", cache.authorization_header().await?)),
            None => Ok(request),
        }
    }

    async fn send_json(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, A2aClientError> {
        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| A2aClientError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(A2aClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| A2aClientError::InvalidResponse {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Fetch the agent card published under `base_url`
    ///
    /// When the card advertises a different address than the one it was fetched
    /// from, the fetch address wins. Trailing slashes are ignored when comparing.
    pub async fn fetch_agent_card(&self, base_url: &str) -> Result<AgentCard, A2aClientError> {
        let url = join_url(base_url, AGENT_CARD_PATH);
        debug!("Fetching agent card from {}", url);

        let value = self.send_json(&url, self.http.get(&url)).await?;
        let card: AgentCard =
            serde_json::from_value(value).map_err(|e| A2aClientError::InvalidResponse {
                url: url.clone(),
                message: format!("Failed to parse agent card: {e}"),
            })?;

        let card = normalize_card_url(card, base_url);
        info!(name = %card.name, url = %card.url, "Fetched agent card");
        Ok(card)
    }

    /// Send one message to the agent at `agent_url` and return its reply
    pub async fn send_message(
        &self,
        agent_url: &str,
        message: Message,
    ) -> Result<Message, A2aClientError> {
        let url = join_url(agent_url, "v1/message:send");
        let params = MessageSendParams {
            message,
            configuration: None,
            metadata: None,
        };

        let value = self
            .send_json(&url, self.http.post(&url).json(&params))
            .await?;
        parse_send_response(value).map_err(|message| A2aClientError::InvalidResponse { url, message })
    }

    /// Send `text` as a user message and return the reply's text
    pub async fn send_text(
        &self,
        agent_url: &str,
        text: &str,
        context_id: Option<String>,
    ) -> Result<String, A2aClientError> {
        let reply = self
            .send_message(agent_url, Message::text(Role::User, text, context_id))
            .await?;
        Ok(reply.text_content())
    }
}

/// Replace the advertised url with the fetch address when they differ
pub fn normalize_card_url(mut card: AgentCard, fetched_from: &str) -> AgentCard {
    if card.url.trim_end_matches('/') != fetched_from.trim_end_matches('/') {
        debug!(
            advertised = %card.url,
            fetched_from,
            "Agent card url differs from fetch location; using fetch location"
        );
        card.url = fetched_from.trim_end_matches('/').to_string();
    }
    card
}

/// Accept `{"message": {...}}` or a bare message object
fn parse_send_response(value: Value) -> Result<Message, String> {
    let message = match value.get("message") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => value,
    };
    serde_json::from_value(message).map_err(|e| format!("Failed to parse reply message: {e}"))
}
