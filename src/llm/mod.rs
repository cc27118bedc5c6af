//! LLM provider abstraction layer
//!
//! A provider-agnostic interface for the single chat completion each agent makes,
//! plus the hosted model provider used in production.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
