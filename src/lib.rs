//! Agentpair - writer and reviewer LLM agents with a two-step workflow
//!
//! # Overview
//!
//! Two small HTTP services each wrap one hosted chat-completion call:
//! - the **writer** turns a topic into a short factual summary
//! - the **reviewer** improves a draft summary for a topic
//!
//! Each service exposes the same core responder through three front-ends:
//! - `POST /invoke` with a typed, schema-validated JSON body
//! - A2A (agent-to-agent) messaging over HTTP+JSON, with an agent card
//! - MCP (Model Context Protocol) tools over JSON-RPC, for agents that have tools
//!
//! The workflow runner discovers both services from their agent cards and chains
//! them, writer then reviewer, once per prompt typed at the console.
//!
//! # Quick Start
//!
//! ```rust
//! use agentpair::config::{AgentKind, ServiceConfig};
//! use agentpair::workflow::wrap_text;
//!
//! let config = ServiceConfig::defaults(AgentKind::Reviewer);
//! assert_eq!(config.service.port, 8001);
//! assert_eq!(config.a2a.base_path, "/a2a");
//!
//! let wrapped = wrap_text("A short\n\nsummary.", 40, "  ");
//! assert_eq!(wrapped, "  A short\n\n  summary.");
//! ```

pub mod a2a;
pub mod agents;
pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod observability;
pub mod service;
pub mod testing;
pub mod tools;
pub mod workflow;

pub use agents::{AgentApp, ReviewerAgent, TextResponder, WriterAgent};
pub use config::{AgentKind, ServiceConfig, WorkflowConfig};
pub use error::{AgentError, AgentResult};
pub use service::{AgentRuntime, RuntimeHolder};
pub use tools::{Tool, ToolDescription, ToolError, ToolSystem};
