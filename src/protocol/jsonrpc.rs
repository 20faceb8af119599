//! JSON-RPC 2.0 message envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    core::error::BridgeError,
    protocol::{notification::Notification, request::Request, response::Response},
};

/// JSON-RPC 2.0 request wrapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub request: Request,
    pub id: RequestId,
}

/// JSON-RPC 2.0 response wrapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: RequestId,
}

/// JSON-RPC 2.0 notification wrapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Request ID (number or string, null when the request could not be read)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes
impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const INVALID_PARAMS: i32 = -32602;

    // Custom error codes
    pub const INVALID_STATE: i32 = -32002;
    pub const BACKEND_ERROR: i32 = -32003;
    pub const NO_ACTIVE_SESSION: i32 = -32010;
    pub const ADAPTER_UNAVAILABLE: i32 = -32011;
    pub const DEVICE_NOT_FOUND: i32 = -32012;

    fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::with_code(Self::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_code(Self::INVALID_REQUEST, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::with_code(Self::INVALID_PARAMS, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::with_code(Self::INVALID_STATE, message)
    }

    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::with_code(Self::BACKEND_ERROR, message)
    }
}

impl From<BridgeError> for JsonRpcError {
    fn from(err: BridgeError) -> Self {
        let code = match &err {
            BridgeError::AdapterUnavailable(_) => Self::ADAPTER_UNAVAILABLE,
            BridgeError::DeviceNotFound(_) => Self::DEVICE_NOT_FOUND,
            BridgeError::NoActiveSession => Self::NO_ACTIVE_SESSION,
            BridgeError::InvalidState { .. } => Self::INVALID_STATE,
            BridgeError::Submit(_) => Self::BACKEND_ERROR,
        };
        Self::with_code(code, err.to_string())
    }
}

impl JsonRpcRequest {
    pub fn new(request: Request, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            request,
            id,
        }
    }

    /// Parse one request line, or produce the error response for it
    pub fn parse(line: &str) -> Result<Self, JsonRpcResponse> {
        let value: Value = serde_json::from_str(line)
            .map_err(|_| JsonRpcResponse::error(JsonRpcError::parse_error(), RequestId::Null))?;

        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value(id).ok())
            .unwrap_or(RequestId::Null);

        if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Err(JsonRpcResponse::error(
                JsonRpcError::invalid_request("Expected jsonrpc 2.0"),
                id,
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| JsonRpcResponse::error(JsonRpcError::invalid_params(e.to_string()), id))
    }
}

impl JsonRpcResponse {
    pub fn success(result: Response, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(error: JsonRpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

impl JsonRpcNotification {
    pub fn new(notification: Notification) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            notification,
        }
    }
}
