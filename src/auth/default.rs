//! Environment-driven credential
//!
//! The token source is picked from the environment once, at construction:
//!
//! 1. `AZURE_TENANT_ID` + `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET`: client-credentials
//!    grant against the identity authority (`AZURE_AUTHORITY_HOST`).
//! 2. `IDENTITY_ENDPOINT` + `IDENTITY_HEADER`: hosted managed identity endpoint.
//! 3. Otherwise the instance metadata service.

use super::{AccessToken, CredentialError, TokenCredential};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const MANAGED_IDENTITY_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    ClientSecret {
        authority: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    ManagedIdentity {
        endpoint: String,
        header: String,
        client_id: Option<String>,
    },
    InstanceMetadata {
        endpoint: String,
        client_id: Option<String>,
    },
}

impl CredentialSource {
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSource::ClientSecret { .. } => "client_secret",
            CredentialSource::ManagedIdentity { .. } => "managed_identity",
            CredentialSource::InstanceMetadata { .. } => "instance_metadata",
        }
    }
}

/// Token credential backed by whichever source the environment configures
pub struct DefaultCredential {
    client: Client,
    source: CredentialSource,
}

impl DefaultCredential {
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let client_id = get("AZURE_CLIENT_ID");
        let source = match (get("AZURE_TENANT_ID"), client_id.clone(), get("AZURE_CLIENT_SECRET")) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                CredentialSource::ClientSecret {
                    authority: get("AZURE_AUTHORITY_HOST")
                        .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
                    tenant_id,
                    client_id,
                    client_secret,
                }
            }
            _ => match (get("IDENTITY_ENDPOINT"), get("IDENTITY_HEADER")) {
                (Some(endpoint), Some(header)) => CredentialSource::ManagedIdentity {
                    endpoint,
                    header,
                    client_id,
                },
                _ => CredentialSource::InstanceMetadata {
                    endpoint: IMDS_ENDPOINT.to_string(),
                    client_id,
                },
            },
        };

        Self::with_source(source)
    }

    pub fn with_source(source: CredentialSource) -> Result<Self, CredentialError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;

        info!(source = source.kind(), "Credential configured");
        Ok(Self { client, source })
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    fn build_request(&self, scope: &str) -> Result<reqwest::RequestBuilder, CredentialError> {
        let resource = scope.trim_end_matches("/.default");

        let request = match &self.source {
            CredentialSource::ClientSecret {
                authority,
                tenant_id,
                client_id,
                client_secret,
            } => {
                let url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    authority.trim_end_matches('/'),
                    tenant_id
                );
                self.client.post(url).form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", scope),
                ])
            }
            CredentialSource::ManagedIdentity {
                endpoint,
                header,
                client_id,
            } => {
                let url = identity_url(
                    endpoint,
                    MANAGED_IDENTITY_API_VERSION,
                    resource,
                    client_id.as_deref(),
                )?;
                self.client.get(url).header("X-IDENTITY-HEADER", header)
            }
            CredentialSource::InstanceMetadata {
                endpoint,
                client_id,
            } => {
                let url = identity_url(endpoint, IMDS_API_VERSION, resource, client_id.as_deref())?;
                self.client.get(url).header("Metadata", "true")
            }
        };

        Ok(request)
    }
}

fn identity_url(
    endpoint: &str,
    api_version: &str,
    resource: &str,
    client_id: Option<&str>,
) -> Result<Url, CredentialError> {
    let mut params = vec![("api-version", api_version), ("resource", resource)];
    if let Some(client_id) = client_id {
        params.push(("client_id", client_id));
    }
    Url::parse_with_params(endpoint, &params)
        .map_err(|e| CredentialError::Unavailable(format!("invalid identity endpoint: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    expires_on: Option<Value>,
}

/// Identity endpoints report numbers either as JSON numbers or numeric strings
fn as_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_token_response(body: TokenResponse) -> Result<AccessToken, CredentialError> {
    let expires_on = match (
        body.expires_on.as_ref().and_then(as_seconds),
        body.expires_in.as_ref().and_then(as_seconds),
    ) {
        (Some(epoch), _) => Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| CredentialError::InvalidResponse(format!("bad expires_on {epoch}")))?,
        (None, Some(secs)) => Utc::now() + chrono::Duration::seconds(secs),
        (None, None) => {
            return Err(CredentialError::InvalidResponse(
                "token response has no expiry".to_string(),
            ))
        }
    };

    Ok(AccessToken {
        token: body.access_token,
        expires_on,
    })
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        debug!(source = self.source.kind(), scope, "Requesting access token");

        let response = self
            .build_request(scope)?
            .send()
            .await
            .map_err(|e| CredentialError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CredentialError::RequestFailed(format!(
                "{} token endpoint returned {status}: {error_text}",
                self.source.kind()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        parse_token_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_client_secret_wins_when_complete() {
        let credential = DefaultCredential::from_lookup(lookup(&[
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_CLIENT_SECRET", "secret"),
            ("IDENTITY_ENDPOINT", "http://localhost:42/token"),
            ("IDENTITY_HEADER", "h"),
        ]))
        .unwrap();
        assert_eq!(credential.source().kind(), "client_secret");
    }

    #[test]
    fn test_managed_identity_when_no_secret() {
        let credential = DefaultCredential::from_lookup(lookup(&[
            ("AZURE_CLIENT_ID", "client"),
            ("IDENTITY_ENDPOINT", "http://localhost:42/token"),
            ("IDENTITY_HEADER", "h"),
        ]))
        .unwrap();
        assert_eq!(
            credential.source(),
            &CredentialSource::ManagedIdentity {
                endpoint: "http://localhost:42/token".to_string(),
                header: "h".to_string(),
                client_id: Some("client".to_string()),
            }
        );
    }

    #[test]
    fn test_falls_back_to_instance_metadata() {
        let credential = DefaultCredential::from_lookup(lookup(&[])).unwrap();
        assert_eq!(credential.source().kind(), "instance_metadata");
    }

    #[test]
    fn test_parse_token_response_prefers_expires_on() {
        let token = parse_token_response(TokenResponse {
            access_token: "abc".to_string(),
            expires_in: Some(json!(10)),
            expires_on: Some(json!("1900000000")),
        })
        .unwrap();
        assert_eq!(token.expires_on.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_parse_token_response_requires_expiry() {
        let result = parse_token_response(TokenResponse {
            access_token: "abc".to_string(),
            expires_in: None,
            expires_on: None,
        });
        assert!(matches!(result, Err(CredentialError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_client_secret_token_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "aad-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = DefaultCredential::with_source(CredentialSource::ClientSecret {
            authority: server.uri(),
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        })
        .unwrap();

        let token = credential
            .get_token("https://cognitiveservices.azure.com/.default")
            .await
            .unwrap();
        assert_eq!(token.token, "aad-token");
        assert!(token.expires_on > Utc::now());
    }

    #[tokio::test]
    async fn test_managed_identity_token_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/msi/token"))
            .and(query_param("api-version", "2019-08-01"))
            .and(query_param("resource", "https://cognitiveservices.azure.com"))
            .and(header("X-IDENTITY-HEADER", "secret-header"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "msi-token",
                "expires_on": "1900000000",
                "resource": "https://cognitiveservices.azure.com",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let credential = DefaultCredential::with_source(CredentialSource::ManagedIdentity {
            endpoint: format!("{}/msi/token", server.uri()),
            header: "secret-header".to_string(),
            client_id: None,
        })
        .unwrap();

        let token = credential
            .get_token("https://cognitiveservices.azure.com/.default")
            .await
            .unwrap();
        assert_eq!(token.token, "msi-token");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("no identity"))
            .mount(&server)
            .await;

        let credential = DefaultCredential::with_source(CredentialSource::InstanceMetadata {
            endpoint: format!("{}/metadata/identity/oauth2/token", server.uri()),
            client_id: None,
        })
        .unwrap();

        let result = credential.get_token("scope/.default").await;
        assert!(matches!(result, Err(CredentialError::RequestFailed(_))));
    }
}
