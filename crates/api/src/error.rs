use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rpcgate_core::error::{
    RpcError, INVALID_REQUEST, NO_POST_DATA, QUEUE_UNAVAILABLE, WORKSPACE_UNAVAILABLE,
};
use rpcgate_core::queue::QueueError;
use rpcgate_core::rpc::RpcResponse;
use rpcgate_core::signature::SignatureError;
use rpcgate_core::workspace::WorkspaceError;
use serde_json::Value;

/// Errors raised before a JSON-RPC result exists.
///
/// Every variant is reported to the caller as a JSON-RPC error envelope with
/// a stable code; method-level failures never come through here, they are
/// part of the normal result.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or mismatched signature. The request never executes.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("No post data.")]
    NoPostData,

    /// The body could not be read or the multipart form is malformed.
    #[error("Unreadable request body: {0}")]
    Body(String),

    /// The body is not a valid JSON-RPC request.
    #[error(transparent)]
    Malformed(RpcError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// The async job could not be enqueued, so no acknowledgement exists.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Convenience type alias for handler return values.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// HTTP status and JSON-RPC error object for this failure.
    fn classify(&self) -> (StatusCode, RpcError) {
        match self {
            GatewayError::Signature(err) => {
                (StatusCode::UNAUTHORIZED, RpcError::new(err.code(), err.to_string()))
            }
            GatewayError::NoPostData => (
                StatusCode::BAD_REQUEST,
                RpcError::new(NO_POST_DATA, "No post data."),
            ),
            GatewayError::Body(msg) => (
                StatusCode::BAD_REQUEST,
                RpcError::new(INVALID_REQUEST, msg.clone()),
            ),
            GatewayError::Malformed(err) => (StatusCode::BAD_REQUEST, err.clone()),
            GatewayError::Workspace(
                err @ (WorkspaceError::InvalidIdentifier(_) | WorkspaceError::InvalidFileName(_)),
            ) => (
                StatusCode::BAD_REQUEST,
                RpcError::new(WORKSPACE_UNAVAILABLE, err.to_string()),
            ),
            GatewayError::Workspace(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                RpcError::new(WORKSPACE_UNAVAILABLE, "Workspace unavailable"),
            ),
            GatewayError::Queue(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                RpcError::new(QUEUE_UNAVAILABLE, "Job could not be queued"),
            ),
        }
    }

    /// Stable JSON-RPC code reported for this failure.
    pub fn code(&self) -> i64 {
        self.classify().1.code
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error) = self.classify();
        // Server-side detail is logged, never sent to the caller.
        if status.is_server_error() {
            tracing::error!(error = %self, code = error.code, "Gateway failure");
        }
        let body = RpcResponse::failure(Value::Null, error).into_value();
        (status, axum::Json(body)).into_response()
    }
}
