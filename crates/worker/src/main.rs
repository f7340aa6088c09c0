use std::sync::{Arc, Mutex};

use anyhow::Context;
use rpcgate_core::dispatch::Dispatcher;
use rpcgate_core::methods::builtin_registry;
use rpcgate_core::queue::FsQueue;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rpcgate_worker::config::WorkerConfig;
use rpcgate_worker::pidfile::PidFile;
use rpcgate_worker::worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();

    // Claimed before the log is touched so a refused start leaves the running
    // worker's log intact.
    let pid_file = PidFile::create(&config.paths.worker_pid_file).with_context(|| {
        format!(
            "Failed to claim pid file {}",
            config.paths.worker_pid_file.display()
        )
    })?;

    // Truncated on start; the gateway's diagnostics report shows its tail.
    let log_path = &config.paths.worker_log_file;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let log_file = std::fs::File::create(log_path)
        .with_context(|| format!("Failed to open worker log {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rpcgate_worker=debug,rpcgate_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    tracing::info!(
        workspace_root = %config.paths.workspace_root.display(),
        queue_dir = %config.paths.queue_dir.display(),
        worker_log = %config.paths.worker_log_file.display(),
        "Loaded worker configuration"
    );

    let queue = Arc::new(FsQueue::new(config.paths.queue_dir.clone()));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(builtin_registry(&config.commands))));
    let worker = Worker::new(config, queue, dispatcher);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();
    handle.await.context("Worker task failed")?;

    drop(pid_file);
    tracing::info!("Worker stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, finishing current job"),
        () = terminate => tracing::info!("Received SIGTERM, finishing current job"),
    }
}
