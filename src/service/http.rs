//! HTTP surface of one agent service
//!
//! | Method | Path | |
//! |--------|------|-|
//! | GET | `/healthz` | liveness and runtime state |
//! | POST | `/invoke` | typed request, schema-validated |
//! | * | `{a2a.base_path}/...` | A2A routes |
//! | POST | `{mcp.base_path}` | MCP JSON-RPC, when the agent has tools |
//! | GET | `/mcp-info` | tool summary, when the agent has tools |

use super::runtime::{AgentRuntime, RuntimeHolder};
use crate::a2a::{self, TextA2aHandler};
use crate::agents::{AgentApp, ModelSettings, ReviewerAgent, TextResponder, WriterAgent};
use crate::config::{AgentKind, ConfigError, ServiceConfig};
use crate::error::{AgentError, AgentResult};
use crate::mcp::{self, McpServer};
use crate::tools::ToolSystem;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Reply};

const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub initialized: bool,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    detail: String,
}

fn detail_reply(status: StatusCode, detail: impl Into<String>) -> Box<dyn Reply> {
    Box::new(warp::reply::with_status(
        warp::reply::json(&ErrorDetail {
            detail: detail.into(),
        }),
        status,
    ))
}

/// Every route of the service for `agent`
pub fn routes<A: AgentApp>(
    config: &ServiceConfig,
    agent: Arc<A>,
    runtime: Arc<RuntimeHolder>,
) -> AgentResult<BoxedFilter<(Box<dyn Reply>,)>> {
    let service_name = config.service.name.clone();
    let health = warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || (service_name.clone(), runtime.clone())))
        .and_then(|(service, runtime): (String, Arc<RuntimeHolder>)| async move {
            let response = HealthResponse {
                status: "ok",
                service,
                initialized: runtime.is_initialized().await,
            };
            Ok::<_, Infallible>(Box::new(warp::reply::json(&response)) as Box<dyn Reply>)
        })
        .boxed();

    let validator = Arc::new(request_validator::<A>()?);
    let invoke_agent = agent.clone();
    let invoke = warp::path("invoke")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(warp::any().map(move || (invoke_agent.clone(), validator.clone())))
        .and_then(|body: Bytes, (agent, validator): (Arc<A>, Arc<Validator>)| async move {
            Ok::<_, Infallible>(handle_invoke(&body, agent.as_ref(), &validator).await)
        })
        .boxed();

    let skill = agent.skill();
    let card = a2a::build_agent_card(
        &config.service.agent_name,
        &config.service.agent_description,
        &config.a2a.public_url,
        &config.a2a.base_path,
        skill,
    );
    let responder: Arc<dyn TextResponder> = agent.clone();
    let handler = Arc::new(TextA2aHandler::new(
        responder,
        config.a2a.include_error_details,
    ));
    let a2a_routes = a2a::server::routes(card, handler, &config.a2a.base_path);

    let mut all = health.or(invoke).unify().or(a2a_routes).unify().boxed();

    let tools = agent.tools();
    if !tools.is_empty() {
        let mut system = ToolSystem::new();
        for tool in tools {
            system
                .register(tool)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        }
        let server = Arc::new(
            McpServer::new(config.service.agent_name.clone(), Arc::new(system))
                .with_instructions(config.service.agent_description.clone()),
        );

        let info = mcp::mcp_info(server.tools(), &config.mcp.base_path);
        let tool_count = server.tools().list_tools().len();
        let info_route = warp::path("mcp-info")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || Box::new(warp::reply::json(&info)) as Box<dyn Reply>);

        all = all
            .or(mcp::routes(server, &config.mcp.base_path))
            .unify()
            .or(info_route)
            .unify()
            .boxed();
        info!(tools = tool_count, "MCP tools mounted at {}", config.mcp.base_path);
    }

    Ok(all)
}

/// Validator for the JSON schema derived from `A::Request`
fn request_validator<A: AgentApp>() -> AgentResult<Validator> {
    let schema = serde_json::to_value(schemars::schema_for!(A::Request))
        .map_err(|e| ConfigError::InvalidConfig(format!("Request schema: {e}")))?;
    jsonschema::validator_for(&schema)
        .map_err(|e| AgentError::from(ConfigError::InvalidConfig(format!("Schema compilation error: {e}"))))
}

async fn handle_invoke<A: AgentApp>(body: &[u8], agent: &A, validator: &Validator) -> Box<dyn Reply> {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => return detail_reply(StatusCode::BAD_REQUEST, format!("Malformed JSON: {e}")),
    };

    if let Err(errors) = validator.validate(&payload) {
        let messages: Vec<String> = errors
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        return detail_reply(StatusCode::UNPROCESSABLE_ENTITY, messages.join("; "));
    }

    let request: A::Request = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => return detail_reply(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };

    match agent.invoke(request).await {
        Ok(response) => Box::new(warp::reply::json(&response)),
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                error!("Invoke failed: {}", e);
            } else {
                warn!("Invoke rejected: {}", e);
            }
            detail_reply(status, e.public_detail())
        }
    }
}

/// Run the service for `config` until SIGINT or SIGTERM
///
/// The runtime is installed before the listener binds. On shutdown the holder is
/// cleared first, so requests still in flight fail with `NotInitialized`.
pub async fn run(config: ServiceConfig) -> AgentResult<()> {
    let runtime = Arc::new(RuntimeHolder::new());
    runtime.install(AgentRuntime::from_config(&config)?).await;
    if let Err(e) = runtime.get().await?.client().health_check().await {
        warn!("Model client check failed; serving anyway: {}", e);
    }

    let settings = ModelSettings::from_config(&config);
    match config.kind {
        AgentKind::Writer => {
            let agent = Arc::new(WriterAgent::new(runtime.clone(), settings));
            serve(&config, agent, runtime).await
        }
        AgentKind::Reviewer => {
            let agent = Arc::new(ReviewerAgent::new(runtime.clone(), settings));
            serve(&config, agent, runtime).await
        }
    }
}

/// Serve until shutdown; the runtime is released on every exit path
async fn serve<A: AgentApp>(
    config: &ServiceConfig,
    agent: Arc<A>,
    runtime: Arc<RuntimeHolder>,
) -> AgentResult<()> {
    let result = serve_until_stopped(config, agent, runtime.clone()).await;
    runtime.shutdown().await;
    if result.is_ok() {
        info!("Service stopped");
    }
    result
}

async fn serve_until_stopped<A: AgentApp>(
    config: &ServiceConfig,
    agent: Arc<A>,
    runtime: Arc<RuntimeHolder>,
) -> AgentResult<()> {
    let routes = routes(config, agent, runtime.clone())?.with(warp::trace::request());
    let addr = resolve_addr(&config.service.host, config.service.port).await?;

    let shutdown_runtime = runtime.clone();
    let shutdown = async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received");
        shutdown_runtime.shutdown().await;
    };

    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| ConfigError::InvalidConfig(format!("Failed to bind {addr}: {e}")))?;

    info!(
        service = %config.service.name,
        agent = %config.service.agent_name,
        "Listening on http://{}",
        bound
    );
    server
        .instrument(tracing::info_span!("service", name = %config.service.name))
        .await;
    Ok(())
}

async fn resolve_addr(host: &str, port: u16) -> AgentResult<SocketAddr> {
    let invalid = || ConfigError::InvalidValue {
        name: "HOST".to_string(),
        value: host.to_string(),
    };
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| invalid())?;
    Ok(addrs.next().ok_or_else(invalid)?)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
