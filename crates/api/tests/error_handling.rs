//! Tests for `GatewayError` -> HTTP response mapping.
//!
//! These call `IntoResponse` directly; no server is involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use rpcgate_api::error::GatewayError;
use rpcgate_core::error::{
    RpcError, INVALID_REQUEST, INVALID_SIGNATURE, MISSING_SIGNATURE, NO_POST_DATA, PARSE_ERROR,
    QUEUE_UNAVAILABLE, WORKSPACE_UNAVAILABLE,
};
use rpcgate_core::queue::QueueError;
use rpcgate_core::signature::SignatureError;
use rpcgate_core::workspace::WorkspaceError;

/// Helper: convert a `GatewayError` into its status code and parsed JSON body.
async fn error_to_response(err: GatewayError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn missing_signature_returns_401() {
    let (status, json) = error_to_response(SignatureError::Missing.into()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["jsonrpc"], "2.0");
    assert_eq!(json["id"], serde_json::Value::Null);
    assert_eq!(json["error"]["code"], MISSING_SIGNATURE);
    assert_eq!(json["error"]["message"], "No signature.");
}

#[tokio::test]
async fn mismatched_signature_returns_401() {
    let (status, json) = error_to_response(SignatureError::Mismatch.into()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], INVALID_SIGNATURE);
    assert_eq!(json["error"]["message"], "Invalid Signature.");
}

#[tokio::test]
async fn no_post_data_returns_400() {
    let (status, json) = error_to_response(GatewayError::NoPostData).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], NO_POST_DATA);
    assert_eq!(json["error"]["message"], "No post data.");
}

#[tokio::test]
async fn unreadable_body_returns_400() {
    let (status, json) =
        error_to_response(GatewayError::Body("Failed to parse multipart".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], INVALID_REQUEST);
}

#[tokio::test]
async fn malformed_request_keeps_its_code() {
    let err = GatewayError::Malformed(RpcError::parse_error("expected value"));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], PARSE_ERROR);
}

#[tokio::test]
async fn invalid_identifier_is_a_client_error() {
    let err = GatewayError::Workspace(WorkspaceError::InvalidIdentifier("../up".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], WORKSPACE_UNAVAILABLE);
}

#[tokio::test]
async fn workspace_io_failure_hides_details() {
    let err = GatewayError::Workspace(WorkspaceError::Io {
        path: "/srv/private/ws".into(),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], WORKSPACE_UNAVAILABLE);
    assert!(!json["error"]["message"].as_str().unwrap().contains("/srv/private"));
}

#[tokio::test]
async fn queue_failure_returns_500() {
    let err = GatewayError::Queue(QueueError::Collision {
        id: "0192".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], QUEUE_UNAVAILABLE);
}
