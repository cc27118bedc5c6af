//! Testing utilities and mock implementations
//!
//! Mocks for the model provider, credentials and workflow steps, so the agents
//! and front-ends can be exercised without a hosted model or running peers.

pub mod mocks;

pub use mocks::*;
