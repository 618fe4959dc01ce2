//! Newline-delimited JSON-RPC 2.0 MCP server over a tool registry.
//!
//! Method routing is hand-rolled: `initialize`, `ping`, `tools/list` and
//! `tools/call`. Requests without an `id` are notifications and get no
//! response.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skyflow_client::{ToolError, ToolRegistry};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, err: &RpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code: err.json_rpc_code(),
                message: err.to_string(),
                data: None,
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Protocol-level failures. Tool failures are not among them: those are
/// reported inside a successful `tools/call` result.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn json_rpc_code(&self) -> i64 {
        match self {
            RpcError::Parse(_) => -32700,
            RpcError::InvalidRequest(_) => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::Internal(_) => -32603,
        }
    }
}

/// Parse one raw line into a request.
pub fn parse_jsonrpc_request(raw: &str) -> std::result::Result<JsonRpcRequest, RpcError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| RpcError::Parse(e.to_string()))?;
    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(|e| RpcError::InvalidRequest(e.to_string()))?;

    if request.jsonrpc != "2.0" {
        return Err(RpcError::InvalidRequest(
            "jsonrpc field must be \"2.0\"".into(),
        ));
    }

    Ok(request)
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

pub struct McpServer {
    registry: ToolRegistry,
    name: String,
    version: String,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Handle one raw line. Returns `None` for notifications.
    pub async fn handle_line(&self, raw: &str) -> Option<JsonRpcResponse> {
        match parse_jsonrpc_request(raw) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(error = %e, "Rejected JSON-RPC message");
                Some(JsonRpcResponse::error(Value::Null, &e))
            }
        }
    }

    /// Route a parsed request to its handler.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(request.params).await,
            other => Err(RpcError::MethodNotFound(other.to_string())),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, &e),
        })
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": self.name, "version": self.version},
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({"tools": self.registry.definitions()})
    }

    async fn handle_tools_call(
        &self,
        params: Option<Value>,
    ) -> std::result::Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::InvalidParams("missing params".into()))?;
        let params: CallParams =
            serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))?;

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let result = match self.registry.call(&params.name, arguments).await {
            Ok(result) => result,
            Err(ToolError::UnknownTool(name)) => {
                return Err(RpcError::InvalidParams(format!("unknown tool: {name}")))
            }
            Err(e) => {
                warn!(tool = %params.name, code = e.code(), error = %e, "Tool call failed");
                skyflow_client::CallToolResult::error(format!("{}: {}", e.code(), e))
            }
        };

        serde_json::to_value(&result).map_err(|e| RpcError::Internal(e.to_string()))
    }

    /// Serve until `reader` reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(tools = self.registry.len(), "MCP server ready");

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read request")? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                writer
                    .write_all(&out)
                    .await
                    .context("Failed to write response")?;
                writer.flush().await?;
            }
        }

        info!("Input closed, shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyflow_client::testing::MockDetectService;
    use skyflow_client::{
        register_tools, validate_vault_config, ApiError, SkyflowClient, ToolOptions, VaultParams,
    };
    use std::sync::Arc;

    fn server_with(mock: MockDetectService) -> McpServer {
        let identity = validate_vault_config(&VaultParams::new(
            "vault-123",
            "https://abc123.vault.skyflowapis.com",
        ))
        .unwrap();
        let client = SkyflowClient::with_service(identity, Arc::new(mock));

        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, &client, &ToolOptions::with_prefix("skyflow_"));
        McpServer::new(registry)
    }

    async fn call(server: &McpServer, message: Value) -> Option<Value> {
        server
            .handle_line(&message.to_string())
            .await
            .map(|response| serde_json::to_value(response).unwrap())
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server_with(MockDetectService::new());
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await
        .unwrap();

        assert_eq!(response["id"], 1);
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert!(response["result"]["capabilities"]["tools"].is_object());
        assert_eq!(response["result"]["serverInfo"]["name"], "skyflow-mcp");
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server_with(MockDetectService::new());
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = server_with(MockDetectService::new());
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}),
        )
        .await
        .unwrap();

        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "skyflow_deidentify");
        assert_eq!(tools[1]["name"], "skyflow_reidentify");
        assert!(tools[0]["inputSchema"].is_object());
        assert!(tools[0]["outputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_tools_call_returns_structured_content() {
        let server = server_with(MockDetectService::new().with_deidentified_text("[SSN_1]"));
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": {
                    "name": "skyflow_deidentify",
                    "arguments": {"inputString": "123-45-6789"}
                }
            }),
        )
        .await
        .unwrap();

        let result = &response["result"];
        assert_eq!(result["structuredContent"]["processedText"], "[SSN_1]");
        assert_eq!(result["content"][0]["type"], "text");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_vault_failure_is_tool_error_result() {
        let server = server_with(
            MockDetectService::new()
                .with_reidentify_failure(ApiError::new("token expired").with_status(401)),
        );
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "tools/call",
                "params": {"name": "skyflow_reidentify", "arguments": {"inputString": "[X]"}}
            }),
        )
        .await
        .unwrap();

        let result = &response["result"];
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("REIDENTIFY_ERROR"));
        assert!(text.contains("token expired"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server_with(MockDetectService::new());

        let unknown_tool = call(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                "params": {"name": "nope", "arguments": {}}
            }),
        )
        .await
        .unwrap();
        assert_eq!(unknown_tool["error"]["code"], -32602);
        assert!(unknown_tool.get("result").is_none());

        let missing_params = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call"}),
        )
        .await
        .unwrap();
        assert_eq!(missing_params["error"]["code"], -32602);

        let unknown_method = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}),
        )
        .await
        .unwrap();
        assert_eq!(unknown_method["error"]["code"], -32601);
        assert_eq!(unknown_method["id"], 3);

        let wrong_version = call(
            &server,
            json!({"jsonrpc": "1.0", "id": 4, "method": "ping"}),
        )
        .await
        .unwrap();
        assert_eq!(wrong_version["error"]["code"], -32600);

        let garbage = server.handle_line("{not json").await.unwrap();
        let garbage = serde_json::to_value(garbage).unwrap();
        assert_eq!(garbage["error"]["code"], -32700);
        assert_eq!(garbage["id"], Value::Null);
    }

    #[test]
    fn test_json_rpc_codes() {
        assert_eq!(RpcError::Parse("x".into()).json_rpc_code(), -32700);
        assert_eq!(RpcError::InvalidRequest("x".into()).json_rpc_code(), -32600);
        assert_eq!(RpcError::MethodNotFound("x".into()).json_rpc_code(), -32601);
        assert_eq!(RpcError::InvalidParams("x".into()).json_rpc_code(), -32602);
        assert_eq!(RpcError::Internal("x".into()).json_rpc_code(), -32603);
    }

    #[test]
    fn test_internal_error_response_shape() {
        let response = JsonRpcResponse::error(json!(9), &RpcError::Internal("boom".into()));
        let value = serde_json::to_value(response).unwrap();

        assert_eq!(value["error"]["code"], -32603);
        assert_eq!(value["error"]["message"], "internal error: boom");
        assert!(value["error"].get("data").is_none());
        assert!(value.get("result").is_none());
    }

    #[tokio::test]
    async fn test_serve_round_trip() {
        let server = server_with(MockDetectService::new());
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );

        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
    }
}
