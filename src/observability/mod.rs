//! Observability: structured logging and operation spans

pub mod logging;

// Re-export for convenience
pub use logging::{init_logging, init_logging_from_env, LogFormat, LogOutput};

// Span macros for structured logging
pub use logging::{a2a_span, invoke_span, tool_span, workflow_span};
