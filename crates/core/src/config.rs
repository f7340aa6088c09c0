//! Settings shared by the gateway and the worker.
//!
//! Both processes must agree on where workspaces and queued jobs live, so
//! these are read from the same environment variables on each side.

use std::path::PathBuf;
use std::time::Duration;

/// Filesystem locations shared between gateway and worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Parent directory of all workspaces.
    pub workspace_root: PathBuf,
    /// Directory holding one file per pending job.
    pub queue_dir: PathBuf,
    /// Pid file written by a running worker.
    pub worker_pid_file: PathBuf,
    /// Plain-text copy of the worker's log, read back by diagnostics.
    pub worker_log_file: PathBuf,
}

impl Default for RuntimePaths {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("/tmp/jsonrpc"),
            queue_dir: PathBuf::from("/tmp/jsonrpc_queue"),
            worker_pid_file: PathBuf::from("/tmp/jsonrpc_daemon.pid"),
            worker_log_file: PathBuf::from("/tmp/jsonrpc_worker.log"),
        }
    }
}

impl RuntimePaths {
    /// Load paths from environment variables with defaults.
    ///
    /// | Env Var               | Default                    |
    /// |-----------------------|----------------------------|
    /// | `RPC_WORKSPACE_ROOT`  | `/tmp/jsonrpc`             |
    /// | `RPC_QUEUE_DIR`       | `/tmp/jsonrpc_queue`       |
    /// | `RPC_WORKER_PID_FILE` | `/tmp/jsonrpc_daemon.pid`  |
    /// | `RPC_WORKER_LOG_FILE` | `/tmp/jsonrpc_worker.log`  |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workspace_root: env_path("RPC_WORKSPACE_ROOT").unwrap_or(defaults.workspace_root),
            queue_dir: env_path("RPC_QUEUE_DIR").unwrap_or(defaults.queue_dir),
            worker_pid_file: env_path("RPC_WORKER_PID_FILE").unwrap_or(defaults.worker_pid_file),
            worker_log_file: env_path("RPC_WORKER_LOG_FILE").unwrap_or(defaults.worker_log_file),
        }
    }
}

/// Settings for the command-backed methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSettings {
    /// Program run by the `curl` method.
    pub curl_binary: String,
    /// Wall-clock limit for one command invocation.
    pub timeout: Duration,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            curl_binary: "curl".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl CommandSettings {
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `RPC_CURL_BINARY`          | `curl`  |
    /// | `RPC_COMMAND_TIMEOUT_SECS` | `300`   |
    pub fn from_env() -> Self {
        let curl_binary = std::env::var("RPC_CURL_BINARY").unwrap_or_else(|_| "curl".into());

        let timeout_secs: u64 = std::env::var("RPC_COMMAND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("RPC_COMMAND_TIMEOUT_SECS must be a valid u64");

        Self {
            curl_binary,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
