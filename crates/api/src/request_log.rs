//! Optional per-request log written into the workspace (`log` flag).
//!
//! The record pairs the request body with the response the caller received
//! and the request's transport environment (its headers), so a caller can
//! inspect it later through the diagnostics report.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use rpcgate_core::workspace::{Workspace, WorkspaceError, LOG_FILE};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct RequestLog {
    #[serde(rename = "Request")]
    pub request: Value,
    #[serde(rename = "Result")]
    pub result: Value,
    #[serde(rename = "Environment")]
    pub environment: Vec<(String, String)>,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl RequestLog {
    pub fn new(body: &[u8], result: Value, headers: &HeaderMap) -> Self {
        Self {
            request: body_as_value(body),
            result,
            environment: header_environment(headers),
            timestamp: Utc::now(),
        }
    }

    /// Write the record to `jsonrpc.log`, replacing any previous one.
    pub async fn write(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        let contents = serde_json::to_vec_pretty(self).unwrap_or_default();
        workspace.write_file(LOG_FILE, &contents).await?;
        Ok(())
    }
}

/// The body as JSON when it parses, otherwise as a lossy string.
pub fn body_as_value(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Request headers as sorted `(name, value)` pairs. Non-UTF-8 values are
/// replaced lossily.
fn header_environment(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    env.sort();
    env
}
