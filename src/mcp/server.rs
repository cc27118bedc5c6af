//! MCP server over HTTP JSON-RPC
//!
//! One `POST` endpoint takes a JSON-RPC request and answers with a JSON-RPC
//! response. Notifications get `202 Accepted` with an empty body.

use super::protocol::*;
use crate::a2a::server::path_prefix;
use crate::tools::{ToolError, ToolSystem};
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Reply};

/// MCP server exposing a [`ToolSystem`]
pub struct McpServer {
    name: String,
    version: String,
    instructions: Option<String>,
    tools: Arc<ToolSystem>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, tools: Arc<ToolSystem>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            tools,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tools(&self) -> &ToolSystem {
        &self.tools
    }

    /// Parse and handle one raw request body
    pub async fn handle_body(&self, body: &[u8]) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(e) => {
                warn!("Invalid JSON-RPC request: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };
        self.handle_request(request).await
    }

    /// Handle a single JSON-RPC request; `None` for notifications
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != "2.0" {
            return request.id.as_ref().map(|_| {
                JsonRpcResponse::error(
                    id.clone(),
                    INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                )
            });
        }

        match request.method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: ToolsCapability {
                            list_changed: false,
                        },
                    },
                    server_info: ServerInfo {
                        name: self.name.clone(),
                        version: self.version.clone(),
                    },
                    instructions: self.instructions.clone(),
                };
                Some(to_response(id, result))
            }

            "notifications/initialized" => {
                info!("MCP client initialized");
                None
            }

            "ping" => Some(JsonRpcResponse::success(id, json!({}))),

            "tools/list" => {
                let tools = self.list_tools();
                debug!("MCP tools/list: returning {} tools", tools.len());
                Some(JsonRpcResponse::success(id, json!({ "tools": tools })))
            }

            "tools/call" => Some(self.call_tool(id, &request.params).await),

            _ => {
                warn!("MCP unknown method: {}", request.method);
                if request.id.is_none() {
                    None
                } else {
                    Some(JsonRpcResponse::error(
                        id,
                        METHOD_NOT_FOUND,
                        format!("Unknown method: {}", request.method),
                    ))
                }
            }
        }
    }

    pub fn list_tools(&self) -> Vec<McpTool> {
        self.tools
            .descriptions()
            .map(|d| McpTool {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.parameters.clone(),
                output_schema: d.output_schema.clone(),
            })
            .collect()
    }

    async fn call_tool(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if name.is_empty() {
            return JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                "Missing 'name' parameter".to_string(),
            );
        }
        if self.tools.describe_tool(name).is_none() {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
        }

        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        info!("MCP tools/call: {}", name);
        let result = match self.tools.execute_tool(name, &arguments).await {
            Ok(value) => ToolCallResult::success(value),
            Err(e) => {
                warn!(tool = name, "Tool call failed: {}", e);
                ToolCallResult::error(tool_error_text(&e))
            }
        };
        to_response(id, result)
    }
}

fn to_response<T: serde::Serialize>(id: Value, result: T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}

/// Text of a structured tool error
fn tool_error_text(error: &ToolError) -> String {
    match error {
        ToolError::Agent(agent_error) => {
            format!("{}: {}", agent_error.kind(), agent_error.public_detail())
        }
        other => crate::error::sanitize_error_message(&other.to_string()),
    }
}

/// `POST {base_path}` JSON-RPC endpoint
pub fn routes(server: Arc<McpServer>, base_path: &str) -> BoxedFilter<(Box<dyn Reply>,)> {
    let with_server = warp::any().map(move || server.clone());

    path_prefix(base_path)
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_server)
        .and_then(handle_post)
        .boxed()
}

async fn handle_post(body: Bytes, server: Arc<McpServer>) -> Result<Box<dyn Reply>, Infallible> {
    Ok(match server.handle_body(&body).await {
        Some(response) => Box::new(warp::reply::json(&response)),
        None => Box::new(StatusCode::ACCEPTED),
    })
}

/// Human-oriented description of the tools served at `endpoint`
pub fn mcp_info(tools: &ToolSystem, endpoint: &str) -> Value {
    let tools: Vec<Value> = tools
        .descriptions()
        .map(|d| {
            json!({
                "name": d.name,
                "description": d.description,
                "parameters": summarize_properties(&d.parameters, true),
                "returns": d
                    .output_schema
                    .as_ref()
                    .map(|schema| summarize_properties(schema, false))
                    .unwrap_or_else(|| json!({})),
            })
        })
        .collect();

    json!({
        "protocol": "Model Context Protocol (MCP)",
        "endpoint": endpoint,
        "tools": tools,
        "usage": {
            "description": "Connect an MCP client to this endpoint to use the tools",
            "examples": [
                "Claude Desktop",
                "VS Code with MCP extension",
                "Custom MCP clients"
            ]
        }
    })
}

/// Flatten a JSON schema's properties into `{name: {type, description[, required]}}`
fn summarize_properties(schema: &Value, with_required: bool) -> Value {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut summary = Map::new();
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            let mut entry = Map::new();
            entry.insert(
                "type".to_string(),
                property.get("type").cloned().unwrap_or(Value::Null),
            );
            if let Some(description) = property.get("description") {
                entry.insert("description".to_string(), description.clone());
            }
            if with_required {
                entry.insert(
                    "required".to_string(),
                    Value::Bool(required.contains(&name.as_str())),
                );
            }
            summary.insert(name.clone(), Value::Object(entry));
        }
    }
    Value::Object(summary)
}
