//! Agent service process: runtime ownership and the HTTP surface

pub mod http;
pub mod readiness;
pub mod runtime;

pub use http::{routes, run, HealthResponse};
pub use runtime::{AgentRuntime, RuntimeHolder};
