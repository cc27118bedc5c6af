//! Model Context Protocol tool server

pub mod protocol;
pub mod server;

pub use server::{mcp_info, routes, McpServer};
