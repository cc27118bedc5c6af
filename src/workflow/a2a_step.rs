//! Workflow step backed by a remote A2A agent

use super::graph::{AgentStep, WorkflowError};
use crate::a2a::{A2aClient, AgentCard};
use async_trait::async_trait;
use tracing::debug;

pub struct A2aAgentStep {
    id: String,
    card: AgentCard,
    client: A2aClient,
}

impl A2aAgentStep {
    pub fn new(id: impl Into<String>, card: AgentCard, client: A2aClient) -> Self {
        Self {
            id: id.into(),
            card,
            client,
        }
    }
}

#[async_trait]
impl AgentStep for A2aAgentStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.card.name
    }

    async fn run(&self, input: &str) -> Result<String, WorkflowError> {
        debug!(agent = %self.card.name, url = %self.card.url, "Sending A2A message");
        Ok(self.client.send_text(&self.card.url, input, None).await?)
    }
}
