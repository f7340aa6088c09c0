//! Drives the real worker loop against a queue directory, the way the
//! gateway and worker processes share it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rpcgate_core::config::CommandSettings;
use rpcgate_core::dispatch::Dispatcher;
use rpcgate_core::methods::builtin_registry;
use rpcgate_core::queue::{FsQueue, Job, JobQueue};
use rpcgate_core::rpc::RpcRequest;
use rpcgate_core::workspace::{Workspace, RESPONSE_FILE};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use rpcgate_worker::config::WorkerConfig;
use rpcgate_worker::worker::Worker;

fn test_config(root: &Path) -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.paths.workspace_root = root.join("workspaces");
    config.paths.queue_dir = root.join("queue");
    config.paths.worker_pid_file = root.join("worker.pid");
    config.paths.worker_log_file = root.join("worker.log");
    config.poll_interval = Duration::from_millis(10);
    config.cooldown = Duration::from_millis(20);
    config
}

async fn wait_for(path: &Path) -> Value {
    for _ in 0..500 {
        if let Ok(bytes) = tokio::fs::read(path).await {
            if let Ok(value) = serde_json::from_slice(&bytes) {
                return value;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never appeared", path.display());
}

#[tokio::test]
async fn queued_sequence_runs_and_survives_poison() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let queue = Arc::new(FsQueue::new(config.paths.queue_dir.clone()));

    tokio::fs::create_dir_all(&config.paths.queue_dir).await.unwrap();
    let poison = config.paths.queue_dir.join("garbage");
    tokio::fs::write(&poison, b"not json").await.unwrap();
    filetime::set_file_mtime(&poison, filetime::FileTime::from_unix_time(1_000, 0)).unwrap();

    let workspace = Workspace::new(config.paths.workspace_root.join("async-1"));
    let request = RpcRequest::new(
        json!(9),
        "sequence",
        vec![json!([
            {"jsonrpc": "2.0", "id": 1, "method": "ping", "params": []},
            {"jsonrpc": "2.0", "id": 2, "method": "missing", "params": []}
        ])],
    );
    queue
        .enqueue(&Job {
            workspace: workspace.clone(),
            request,
        })
        .await
        .unwrap();

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(builtin_registry(
        &CommandSettings::default(),
    ))));
    let worker = Worker::new(config, queue.clone(), dispatcher);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    let response = wait_for(&workspace.file(RESPONSE_FILE)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(response["id"], 9);
    let slots = response["result"].as_array().unwrap();
    assert_eq!(slots[0]["result"], true);
    assert_eq!(slots[1]["error"]["code"], rpcgate_core::error::METHOD_NOT_FOUND);
    assert!(!poison.exists());
    assert!(queue.pending().await.unwrap().is_empty());
}
