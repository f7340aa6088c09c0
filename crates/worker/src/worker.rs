//! The background job loop.
//!
//! A single sequential consumer: scan the queue, run at most one job, repeat.
//! Dequeued jobs are already off the queue, so every failure from here on is
//! final for that job. The loop itself never stops on a job failure; it logs,
//! waits out the cooldown, and scans again.

use std::sync::Arc;
use std::time::SystemTime;

use rpcgate_core::dispatch::Dispatcher;
use rpcgate_core::queue::{DequeuedJob, Job, JobQueue, QueueError};
use rpcgate_core::workspace::{
    CleanupReport, WorkspaceError, WorkspaceManager, JOB_FILE, RESPONSE_FILE,
};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Infrastructure failures. Method-level errors are not in here; they are
/// ordinary results written to `_response`.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("Failed to record job {job_id}: {source}")]
    Record {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job {job_id} aborted: {reason}")]
    Aborted { job_id: String, reason: String },
}

/// What one scan did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// The queue was empty.
    Idle,
    /// A job ran to completion. `failed` is true for a JSON-RPC error result.
    Executed { job_id: String, failed: bool },
}

pub struct Worker {
    config: WorkerConfig,
    queue: Arc<dyn JobQueue>,
    dispatcher: Arc<Dispatcher>,
    workspaces: Arc<WorkspaceManager>,
    scans: u64,
}

impl Worker {
    pub fn new(config: WorkerConfig, queue: Arc<dyn JobQueue>, dispatcher: Arc<Dispatcher>) -> Self {
        let workspaces = Arc::new(WorkspaceManager::new(config.paths.workspace_root.clone()));
        Self {
            config,
            queue,
            dispatcher,
            workspaces,
            scans: 0,
        }
    }

    /// Run until `cancel` fires. A job in progress is finished first.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            cooldown_secs = self.config.cooldown.as_secs(),
            cleanup_every_scans = self.config.cleanup_every_scans,
            "Worker loop started"
        );

        while !cancel.is_cancelled() {
            let delay = match self.scan_once().await {
                Ok(Scan::Idle) => self.config.poll_interval,
                Ok(Scan::Executed { .. }) => continue,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Worker failure, cooling down"
                    );
                    self.config.cooldown
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Worker loop stopping");
    }

    /// One iteration: sweep if due, then take and execute the oldest job.
    pub async fn scan_once(&mut self) -> Result<Scan, WorkerError> {
        if self.scans % self.config.cleanup_every_scans.max(1) == 0 {
            self.cleanup().await;
        }
        self.scans = self.scans.wrapping_add(1);

        match self.queue.dequeue_oldest().await? {
            None => Ok(Scan::Idle),
            Some(dequeued) => self.execute(dequeued).await,
        }
    }

    /// Remove workspaces older than the retention period.
    pub async fn cleanup(&self) -> CleanupReport {
        let workspaces = Arc::clone(&self.workspaces);
        let retention = self.config.retention;

        match tokio::task::spawn_blocking(move || workspaces.sweep(retention, SystemTime::now()))
            .await
        {
            Ok(report) => {
                if report.removed > 0 || report.failed > 0 {
                    tracing::info!(
                        scanned = report.scanned,
                        removed = report.removed,
                        failed = report.failed,
                        "Workspace retention sweep"
                    );
                } else {
                    tracing::debug!(scanned = report.scanned, "Workspace retention: nothing expired");
                }
                report
            }
            Err(e) => {
                tracing::error!(error = %e, "Workspace retention sweep aborted");
                CleanupReport::default()
            }
        }
    }

    async fn execute(&self, dequeued: DequeuedJob) -> Result<Scan, WorkerError> {
        let DequeuedJob { id: job_id, job } = dequeued;
        let Job { workspace, request } = job;

        self.workspaces.ensure(&workspace).await?;

        let record = serde_json::to_vec_pretty(&Job {
            workspace: workspace.clone(),
            request: request.clone(),
        })
        .map_err(|source| WorkerError::Record {
            job_id: job_id.clone(),
            source,
        })?;
        workspace.write_file(JOB_FILE, &record).await?;

        tracing::info!(
            job_id = %job_id,
            method = %request.method,
            workspace = %workspace.path().display(),
            "Executing job"
        );

        // A panicking method takes down only its own task.
        let dispatcher = Arc::clone(&self.dispatcher);
        let task_workspace = workspace.clone();
        let response = tokio::spawn(async move { dispatcher.dispatch(&request, &task_workspace).await })
            .await
            .map_err(|e| WorkerError::Aborted {
                job_id: job_id.clone(),
                reason: e.to_string(),
            })?;

        let failed = response.is_error();
        if let Some(err) = response.error() {
            tracing::warn!(job_id = %job_id, code = err.code, error = %err.message, "Job returned an error");
        } else {
            tracing::info!(job_id = %job_id, "Job completed");
        }

        let body = serde_json::to_vec_pretty(&response.into_value()).map_err(|source| {
            WorkerError::Record {
                job_id: job_id.clone(),
                source,
            }
        })?;
        workspace.write_file(RESPONSE_FILE, &body).await?;

        Ok(Scan::Executed { job_id, failed })
    }
}
