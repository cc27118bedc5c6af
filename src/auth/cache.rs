//! Lazily refreshed bearer token

use super::{AccessToken, CredentialError, TokenCredential};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Tokens this close to expiry are refreshed before use
pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 60;

#[derive(Debug, Default)]
struct TokenState {
    current: Option<AccessToken>,
}

impl TokenState {
    fn fresh(&self, now: DateTime<Utc>, skew: Duration) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|t| t.expires_on - now > skew)
            .map(|t| t.token.as_str())
    }
}

/// Caches one token per scope and refreshes it at most once per expiry
///
/// Readers holding a fresh token only take the shared lock. A refresh takes the
/// exclusive lock and re-checks freshness, so concurrent callers that raced past
/// the fast path wait and then reuse the token the first one fetched.
pub struct BearerTokenCache {
    credential: Arc<dyn TokenCredential>,
    scope: String,
    skew: Duration,
    state: RwLock<TokenState>,
}

impl BearerTokenCache {
    pub fn new(credential: Arc<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self::with_skew(
            credential,
            scope,
            Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
        )
    }

    pub fn with_skew(
        credential: Arc<dyn TokenCredential>,
        scope: impl Into<String>,
        skew: Duration,
    ) -> Self {
        Self {
            credential,
            scope: scope.into(),
            skew,
            state: RwLock::new(TokenState::default()),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Current token, fetching a new one when absent or near expiry
    pub async fn token(&self) -> Result<String, CredentialError> {
        {
            let state = self.state.read().await;
            if let Some(token) = state.fresh(Utc::now(), self.skew) {
                return Ok(token.to_string());
            }
        }

        let mut state = self.state.write().await;
        if let Some(token) = state.fresh(Utc::now(), self.skew) {
            return Ok(token.to_string());
        }

        debug!(scope = %self.scope, "Refreshing bearer token");
        let fetched = self.credential.get_token(&self.scope).await?;
        let token = fetched.token.clone();
        state.current = Some(fetched);
        Ok(token)
    }

    /// `Authorization` header value for the current token
    pub async fn authorization_header(&self) -> Result<String, CredentialError> {
        Ok(format!("Bearer {}", self.token().await?))
    }

    /// Drop the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        self.state.write().await.current = None;
    }
}
