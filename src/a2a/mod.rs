//! A2A (Agent-to-Agent) messaging over HTTP+JSON
//!
//! Server side: an agent card, message send, single-event streaming, and task
//! operations that report unsupported. Client side: card discovery and message send
//! for the workflow.

pub mod client;
pub mod handler;
pub mod protocol;
pub mod server;

pub use client::{A2aClient, A2aClientError};
pub use handler::{A2aRequestHandler, TextA2aHandler};
pub use protocol::{AgentCapabilities, AgentCard, AgentSkill, Message, Part, Role};

use protocol::{join_url, PROTOCOL_VERSION, TEXT_PLAIN, TRANSPORT_HTTP_JSON};

pub const AGENT_VERSION: &str = "0.1.0";

/// Card for a text agent served at `public_url` + `base_path`
pub fn build_agent_card(
    name: &str,
    description: &str,
    public_url: &str,
    base_path: &str,
    skill: AgentSkill,
) -> AgentCard {
    AgentCard {
        name: name.to_string(),
        description: description.to_string(),
        version: AGENT_VERSION.to_string(),
        url: join_url(public_url, base_path),
        protocol_version: PROTOCOL_VERSION.to_string(),
        preferred_transport: Some(TRANSPORT_HTTP_JSON.to_string()),
        capabilities: AgentCapabilities {
            streaming: true,
            push_notifications: false,
        },
        default_input_modes: vec![TEXT_PLAIN.to_string()],
        default_output_modes: vec![TEXT_PLAIN.to_string()],
        skills: vec![skill],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_url_joins_public_url_and_prefix() {
        let card = build_agent_card(
            "writer-agent",
            "Writes",
            "http://127.0.0.1:8000/",
            "/a2a",
            AgentSkill {
                id: "write-summary".to_string(),
                name: "Write summary".to_string(),
                description: "d".to_string(),
                tags: vec![],
            },
        );

        assert_eq!(card.url, "http://127.0.0.1:8000/a2a");
        assert_eq!(card.version, "0.1.0");
        assert!(card.capabilities.streaming);
        assert!(!card.capabilities.push_notifications);
        assert_eq!(card.skills.len(), 1);
    }
}
