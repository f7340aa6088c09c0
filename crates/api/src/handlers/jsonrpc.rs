//! The JSON-RPC endpoint.
//!
//! Intake order matters: the signature parameter is checked for presence
//! before the body is read, and verified before anything touches the
//! filesystem. Uploads are staged into the workspace before dispatch, so
//! methods can refer to them by plain file name on both paths.

use axum::extract::{Query, Request, State};
use axum::http::HeaderMap;
use axum::Json;
use rpcgate_core::queue::Job;
use rpcgate_core::rpc::{RpcRequest, RpcResponse};
use rpcgate_core::signature::SignatureError;
use rpcgate_core::workspace::{Workspace, REQUEST_FILE};
use serde_json::{json, Value};

use crate::diagnostics;
use crate::error::{GatewayError, GatewayResult};
use crate::intake::{read_intake, Intake};
use crate::options::GatewayOptions;
use crate::request_log::RequestLog;
use crate::state::AppState;

/// POST /jsonrpc
pub async fn handle(
    State(state): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    request: Request,
) -> GatewayResult<Json<Value>> {
    let options = GatewayOptions::from_pairs(query);
    let signature = options
        .signature
        .as_deref()
        .ok_or(GatewayError::Signature(SignatureError::Missing))?;

    let intake = read_intake(request, &state).await?;

    if let Err(err) = state.authenticator.verify(&intake.body, Some(signature)) {
        tracing::warn!(error = %err, "Rejected request with invalid signature");
        return Err(err.into());
    }

    if options.wants_diagnostics() {
        let report = diagnostics::collect(&state, options.workspace()).await?;
        return Ok(Json(serde_json::to_value(report).unwrap_or(Value::Null)));
    }

    let rpc_request = RpcRequest::parse(&intake.body).map_err(GatewayError::Malformed)?;

    let workspace = state.workspaces.resolve(options.workspace())?;
    state.workspaces.ensure(&workspace).await?;
    stage(&state, &workspace, &intake).await?;

    tracing::info!(
        method = %rpc_request.method,
        workspace = %workspace.path().display(),
        run_async = options.is_async(),
        uploads = intake.uploads.len(),
        "Accepted JSON-RPC request"
    );

    let response = if options.is_async() {
        enqueue(&state, workspace.clone(), rpc_request).await?
    } else {
        state.dispatcher.dispatch(&rpc_request, &workspace).await
    };
    let response = response.into_value();

    if options.wants_log() {
        let log = RequestLog::new(&intake.body, response.clone(), &headers);
        if let Err(e) = log.write(&workspace).await {
            tracing::warn!(error = %e, "Failed to write request log");
        }
    }

    Ok(Json(response))
}

/// Write uploads and the raw body into the workspace.
async fn stage(state: &AppState, workspace: &Workspace, intake: &Intake) -> GatewayResult<()> {
    for upload in &intake.uploads {
        let dest = state
            .workspaces
            .stage_file(workspace, &upload.file_name, &upload.contents)
            .await?;
        tracing::debug!(path = %dest.display(), bytes = upload.contents.len(), "Staged upload");
    }
    workspace.write_file(REQUEST_FILE, &intake.body).await?;
    Ok(())
}

/// Hand the request to the worker and acknowledge.
///
/// The acknowledgement is the only reply an async caller gets; the outcome is
/// observable later in the workspace (`_response`, diagnostics).
async fn enqueue(
    state: &AppState,
    workspace: Workspace,
    request: RpcRequest,
) -> GatewayResult<RpcResponse> {
    let id = request.id.clone();
    let job = Job {
        workspace: workspace.clone(),
        request,
    };
    let handle = state.queue.enqueue(&job).await?;

    tracing::info!(job_id = %handle.id, "Job queued");

    Ok(RpcResponse::success(
        id,
        json!({
            "queue_path": handle.path,
            "job_id": handle.id,
            "workspace": workspace.path(),
        }),
    ))
}
