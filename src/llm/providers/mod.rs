//! LLM provider implementations

pub mod foundry;

pub use foundry::*;
