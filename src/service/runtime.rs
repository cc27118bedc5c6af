//! Long-lived model client and credential owned by one service process
//!
//! [`RuntimeHolder`] is created by the server, passed to every handler, and is the
//! only path to the model. Handlers clone the `Arc` out and release the lock before
//! the model call.

use crate::auth::{BearerTokenCache, DefaultCredential, TokenCredential};
use crate::config::ServiceConfig;
use crate::error::{AgentError, AgentResult};
use crate::llm::{FoundryAuth, FoundryConfig, FoundryProvider, LlmError, LlmProvider};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// The model client together with the credential it authenticates with
pub struct AgentRuntime {
    credential: Arc<dyn TokenCredential>,
    client: Arc<dyn LlmProvider>,
}

impl AgentRuntime {
    pub fn new(credential: Arc<dyn TokenCredential>, client: Arc<dyn LlmProvider>) -> Self {
        Self { credential, client }
    }

    /// Build the hosted model client from configuration
    ///
    /// Uses the configured API key when present and bearer tokens from the default
    /// credential otherwise. The credential is created either way so shutdown has a
    /// single path.
    pub fn from_config(config: &ServiceConfig) -> AgentResult<Self> {
        let credential: Arc<dyn TokenCredential> = Arc::new(
            DefaultCredential::from_env()
                .map_err(|e| AgentError::upstream_failure(e.to_string()))?,
        );

        let auth = match config.get_model_api_key() {
            Some(key) => FoundryAuth::ApiKey(key),
            None => FoundryAuth::Bearer(Arc::new(BearerTokenCache::new(
                credential.clone(),
                config.model.token_scope.clone(),
            ))),
        };

        let provider = FoundryProvider::new(
            FoundryConfig {
                endpoint: config.require_endpoint()?.to_string(),
                deployment: config.require_deployment()?.to_string(),
                api_version: config.model.api_version.clone(),
                // Outer bounded wait is the responder's; this only stops runaway sockets.
                timeout: config.model_timeout().saturating_mul(2),
            },
            auth,
        )
        .map_err(|e| AgentError::upstream_failure(e.to_string()))?;

        Ok(Self::new(credential, Arc::new(provider)))
    }

    pub fn client(&self) -> &Arc<dyn LlmProvider> {
        &self.client
    }

    /// Close the client, then the credential
    ///
    /// The credential is closed even when closing the client fails; the client
    /// error is returned afterwards.
    pub async fn close(&self) -> Result<(), LlmError> {
        let client_result = self.client.close().await;
        if let Err(e) = &client_result {
            warn!("Model client close failed: {}", e);
        }

        if let Err(e) = self.credential.close().await {
            warn!("Credential close failed: {}", e);
        }

        client_result
    }
}

/// Shared slot holding the runtime while the service is initialized
#[derive(Default)]
pub struct RuntimeHolder {
    slot: RwLock<Option<Arc<AgentRuntime>>>,
}

impl RuntimeHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holder that already contains `runtime`
    pub fn with_runtime(runtime: AgentRuntime) -> Self {
        Self {
            slot: RwLock::new(Some(Arc::new(runtime))),
        }
    }

    pub async fn install(&self, runtime: AgentRuntime) {
        let previous = self.slot.write().await.replace(Arc::new(runtime));
        if let Some(previous) = previous {
            warn!("Replacing an installed runtime");
            let _ = previous.close().await;
        }
        info!("Runtime initialized");
    }

    /// The installed runtime, or `NotInitialized`
    pub async fn get(&self) -> AgentResult<Arc<AgentRuntime>> {
        self.slot
            .read()
            .await
            .clone()
            .ok_or(AgentError::NotInitialized)
    }

    pub async fn is_initialized(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Clear the slot, then close the runtime it held
    pub async fn shutdown(&self) {
        let runtime = self.slot.write().await.take();
        if let Some(runtime) = runtime {
            let _ = runtime.close().await;
            info!("Runtime closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{MockCredential, MockLlmProvider};
    use chrono::Duration;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_empty_holder_reports_not_initialized() {
        let holder = RuntimeHolder::new();
        assert!(!holder.is_initialized().await);
        assert!(matches!(
            holder.get().await,
            Err(AgentError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_install_and_shutdown() {
        let credential = Arc::new(MockCredential::new(Duration::minutes(10)));
        let client = Arc::new(MockLlmProvider::single_response("ok"));
        let holder = RuntimeHolder::new();

        holder
            .install(AgentRuntime::new(credential.clone(), client.clone()))
            .await;
        assert!(holder.is_initialized().await);
        assert!(holder.get().await.is_ok());

        holder.shutdown().await;
        assert!(!holder.is_initialized().await);
        assert!(client.closed.load(Ordering::SeqCst));
        assert!(credential.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_credential_closed_when_client_close_fails() {
        let credential = Arc::new(MockCredential::new(Duration::minutes(10)));
        let client = Arc::new(MockLlmProvider::single_response("ok").with_close_failure());
        let runtime = AgentRuntime::new(credential.clone(), client);

        assert!(runtime.close().await.is_err());
        assert!(credential.closed.load(Ordering::SeqCst));
    }
}
