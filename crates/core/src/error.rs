//! JSON-RPC error objects and the stable error codes the gateway publishes.
//!
//! Codes in the `-32700..=-32600` range follow JSON-RPC 2.0. The
//! `-32099..=-32095` range is gateway-specific and clients key their retry
//! logic on it, so the values must never change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body could not be parsed as JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Body parsed but is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// No method with the requested name is registered.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Parameters are missing or of the wrong shape.
pub const INVALID_PARAMS: i64 = -32602;
/// Unexpected server-side failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// The method ran but reported a failure (non-zero exit, timeout).
pub const EXECUTION_FAILED: i64 = -32000;

/// Workspace could not be created or accessed.
pub const WORKSPACE_UNAVAILABLE: i64 = -32095;
/// The async queue rejected the job.
pub const QUEUE_UNAVAILABLE: i64 = -32096;
/// A signature was supplied but does not match the body.
pub const INVALID_SIGNATURE: i64 = -32097;
/// No `signature` query parameter was supplied.
pub const MISSING_SIGNATURE: i64 = -32098;
/// The request carried no body.
pub const NO_POST_DATA: i64 = -32099;

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured detail (stderr, exit code, ...) to the error.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn into_value(self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("code".into(), Value::from(self.code));
        obj.insert("message".into(), Value::String(self.message));
        if let Some(data) = self.data {
            obj.insert("data".into(), data);
        }
        Value::Object(obj)
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(PARSE_ERROR, "Parse error").with_data(Value::String(detail.to_string()))
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
            .with_data(Value::String(detail.to_string()))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, detail)
    }
}
