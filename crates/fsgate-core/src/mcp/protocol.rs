//! MCP protocol message handling

use super::tools::ToolRegistry;
use crate::error::{Error, ProtocolError};
use crate::sandbox::FileSystemHandler;
use crate::types::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ToolsListResult,
};
use serde::Serialize;
use tracing::{debug, trace, warn};

/// Protocol handler for MCP messages.
///
/// Stateless apart from the shared filesystem handler, so one instance
/// serves every in-flight request.
pub struct ProtocolHandler {
    fs: FileSystemHandler,
    tools: ToolRegistry,
}

impl ProtocolHandler {
    pub fn new(fs: FileSystemHandler, tools: ToolRegistry) -> Self {
        Self { fs, tools }
    }

    pub fn filesystem(&self) -> &FileSystemHandler {
        &self.fs
    }

    /// Parse a single line received from the client.
    ///
    /// Input that is not JSON (including invalid UTF-8) is a parse error; JSON
    /// that is not a request object is an invalid request.
    pub fn parse_line(&self, line: &[u8]) -> Result<JsonRpcRequest, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_slice(line).map_err(|e| ProtocolError::Parse(e.to_string()))?;
        if !value.is_object() {
            return Err(ProtocolError::InvalidRequest(
                "expected a single request object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidRequest(e.to_string()))
    }

    /// Handle a request. Notifications produce no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        trace!("Handling {} (id {:?})", request.method, request.id);

        if request.is_notification() {
            debug!("Notification: {}", request.method);
            return None;
        }

        let request_id = request.id.clone().unwrap_or(serde_json::Value::Null);
        let params = request.params.unwrap_or(serde_json::Value::Null);

        let outcome = match request.method.as_str() {
            "initialize" => to_result(&InitializeResult::default()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_result(&ToolsListResult {
                tools: self.tools.definitions(),
            }),
            "tools/call" => self.call_tool(params).await,
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        };

        Some(match outcome {
            Ok(result) => self.create_response(request_id, result),
            Err(e) => {
                warn!("Request {} failed: {}", request.method, e);
                self.create_error_response(request_id, e.code(), &e.to_string())
            }
        })
    }

    async fn call_tool(
        &self,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ProtocolError> {
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| ProtocolError::InvalidParams(e.to_string()))?;

        let tool = self
            .tools
            .get(&params.name)
            .ok_or_else(|| ProtocolError::UnknownTool(params.name.clone()))?;

        debug!("Calling tool {}", params.name);

        let result = match tool.call(&self.fs, params.arguments).await {
            Ok(text) => CallToolResult::text(text),
            Err(Error::Protocol(e)) => return Err(e),
            Err(e) => {
                warn!("Tool {} failed: {}", params.name, e);
                CallToolResult::error(e.to_string())
            }
        };

        to_result(&result)
    }

    pub fn create_response(
        &self,
        request_id: serde_json::Value,
        result: serde_json::Value,
    ) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: Some(request_id),
            result: Some(result),
            error: None,
        }
    }

    pub fn create_error_response(
        &self,
        request_id: serde_json::Value,
        code: i32,
        message: &str,
    ) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: Some(request_id),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<serde_json::Value, ProtocolError> {
    serde_json::to_value(value).map_err(|e| ProtocolError::Internal(e.to_string()))
}
