//! Readiness probing of a service's `/healthz` endpoint

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Outcome of one readiness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub message: String,
}

impl Readiness {
    fn not_ready(message: impl Into<String>) -> Self {
        Self {
            ready: false,
            message: message.into(),
        }
    }
}

fn field(payload: &Value, name: &str) -> String {
    match payload.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "None".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Probe `url`; ready means HTTP 200 with `"initialized": true` in the JSON body
pub async fn check_healthz(client: &Client, url: &str, timeout: Duration) -> Readiness {
    let response = match client
        .get(url)
        .header("Accept", "application/json")
        .timeout(timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) if e.is_timeout() => return Readiness::not_ready(format!("timeout: {e}")),
        Err(e) => return Readiness::not_ready(format!("request error: {e}")),
    };

    let status = response.status();
    if status.as_u16() != 200 {
        return Readiness::not_ready(format!("HTTP {}", status.as_u16()));
    }

    let payload: Value = match response.json().await {
        Ok(payload) => payload,
        Err(_) => return Readiness::not_ready("invalid JSON"),
    };

    let initialized = payload
        .get("initialized")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let service = field(&payload, "service");
    let status = field(&payload, "status");

    if initialized {
        Readiness {
            ready: true,
            message: format!("ready (service={service}, status={status})"),
        }
    } else {
        Readiness::not_ready(format!(
            "not initialized (service={service}, status={status})"
        ))
    }
}
