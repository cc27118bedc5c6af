//! Credentials and bearer token handling
//!
//! A [`TokenCredential`] issues scoped access tokens. The model provider and the
//! workflow's A2A client never call it directly; they go through a
//! [`BearerTokenCache`], which reuses a token until it is close to expiry.

pub mod cache;
pub mod default;

pub use cache::BearerTokenCache;
pub use default::DefaultCredential;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Scope requested for hosted model calls
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// A bearer token and the instant it stops being valid
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

/// Credential errors
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("Credential unavailable: {0}")]
    Unavailable(String),
    #[error("Token request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Source of scoped access tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Fetch a new token for `scope`
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;

    /// Release any held resources; called once at shutdown
    async fn close(&self) -> Result<(), CredentialError> {
        Ok(())
    }
}
