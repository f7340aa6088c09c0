//! Diagnostics report (`diag` flag).
//!
//! Async callers have no reply channel, so this report is how they observe
//! what happened: the workspace contents, the gateway log, the worker's copy
//! of the job and its outcome, whether the worker is alive, and what is still
//! queued.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use rpcgate_core::queue::PendingEntry;
use rpcgate_core::workspace::{Workspace, JOB_FILE, LOG_FILE, REQUEST_FILE, RESPONSE_FILE};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::GatewayResult;
use crate::request_log::body_as_value;
use crate::state::AppState;

/// How much of the worker log the report carries.
const WORKER_LOG_TAIL_BYTES: u64 = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct DiagnosticsReport {
    /// Workspace inspected: the requested one, or the most recent.
    pub workspace: Option<PathBuf>,
    /// File names inside the workspace.
    pub workspace_files: Vec<String>,
    /// Contents of `jsonrpc.log`.
    pub request_log: Option<Value>,
    /// Contents of `_request`, the body the gateway received.
    pub request: Option<Value>,
    /// Contents of `_job`, the record the worker dequeued.
    pub job: Option<Value>,
    /// Contents of `_response`, the outcome of an async job.
    pub response: Option<Value>,
    /// Pid recorded by the worker, if any.
    pub worker_pid: Option<u32>,
    /// Whether that pid is a live process.
    pub worker_running: bool,
    /// Tail of the worker's log file, where failed jobs and crashes show up.
    pub worker_log: Option<String>,
    /// Jobs not yet picked up by the worker.
    pub queue: Vec<PendingEntry>,
}

/// Build the report for `requested` (a workspace identifier or absolute
/// path), defaulting to the most recently modified workspace.
pub async fn collect(state: &AppState, requested: Option<&str>) -> GatewayResult<DiagnosticsReport> {
    let workspace = match requested {
        Some(id) => Some(state.workspaces.resolve(Some(id))?),
        None => state.workspaces.newest().await,
    };

    let (workspace_files, request_log, request, job, response) = match &workspace {
        Some(ws) => (
            list_files(ws.path()).await,
            read_value(ws, LOG_FILE).await,
            read_value(ws, REQUEST_FILE).await,
            read_value(ws, JOB_FILE).await,
            read_value(ws, RESPONSE_FILE).await,
        ),
        None => (Vec::new(), None, None, None, None),
    };

    let worker_pid = read_pid(&state.config.paths.worker_pid_file).await;
    let worker_running = worker_pid.is_some_and(process_alive);
    let worker_log = read_tail(&state.config.paths.worker_log_file, WORKER_LOG_TAIL_BYTES).await;

    let queue = match state.queue.pending().await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list pending jobs for diagnostics");
            Vec::new()
        }
    };

    Ok(DiagnosticsReport {
        workspace: workspace.map(|ws| ws.path().to_path_buf()),
        workspace_files,
        request_log,
        request,
        job,
        response,
        worker_pid,
        worker_running,
        worker_log,
        queue,
    })
}

/// Whether the worker recorded in the pid file is alive.
pub async fn worker_running(pid_file: &Path) -> bool {
    read_pid(pid_file).await.is_some_and(process_alive)
}

async fn read_pid(pid_file: &Path) -> Option<u32> {
    let contents = tokio::fs::read_to_string(pid_file).await.ok()?;
    contents.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// The last `limit` bytes of `path`, if it exists.
async fn read_tail(path: &Path, limit: u64) -> Option<String> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let len = file.metadata().await.ok()?.len();
    file.seek(SeekFrom::Start(len.saturating_sub(limit))).await.ok()?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await.ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

async fn read_value(workspace: &Workspace, name: &str) -> Option<Value> {
    let bytes = tokio::fs::read(workspace.file(name)).await.ok()?;
    Some(body_as_value(&bytes))
}

async fn list_files(dir: &Path) -> Vec<String> {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return Vec::new();
    };
    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}
