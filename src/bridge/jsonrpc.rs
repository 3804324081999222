use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC "Internal error"
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Error response the bridge sends in place of a server reply it could not get
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn internal_error(id: Value, detail: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcError {
                code: INTERNAL_ERROR,
                message: format!("Bridge error: {detail}"),
            },
        }
    }
}

/// Parse one input line as a JSON message
pub fn parse_message(line: &str) -> Result<Value> {
    serde_json::from_str(line).map_err(|e| BridgeError::ParseError(e.to_string()))
}

/// The `id` to echo when answering `message`; `null` when it has none
pub fn request_id(message: &Value) -> Value {
    message.get("id").cloned().unwrap_or(Value::Null)
}
