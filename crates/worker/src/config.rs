use std::time::Duration;

use rpcgate_core::config::{CommandSettings, RuntimePaths};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub paths: RuntimePaths,
    pub commands: CommandSettings,
    /// Delay between scans of an empty queue.
    pub poll_interval: Duration,
    /// Pause after an infrastructure failure before scanning again.
    pub cooldown: Duration,
    /// A retention sweep runs on the first scan and every this many scans.
    pub cleanup_every_scans: u64,
    /// Workspaces untouched for longer than this are removed.
    pub retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            paths: RuntimePaths::default(),
            commands: CommandSettings::default(),
            poll_interval: Duration::from_millis(1000),
            cooldown: Duration::from_secs(60),
            cleanup_every_scans: 3600,
            retention: Duration::from_secs(24 * 3600),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `WORKER_POLL_INTERVAL_MS`    | `1000`  |
    /// | `WORKER_COOLDOWN_SECS`       | `60`    |
    /// | `WORKER_CLEANUP_EVERY_SCANS` | `3600`  |
    /// | `WORKSPACE_RETENTION_HOURS`  | `24`    |
    ///
    /// Paths and command settings come from [`RuntimePaths::from_env`] and
    /// [`CommandSettings::from_env`].
    pub fn from_env() -> Self {
        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        let cooldown_secs: u64 = std::env::var("WORKER_COOLDOWN_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("WORKER_COOLDOWN_SECS must be a valid u64");

        let cleanup_every_scans: u64 = std::env::var("WORKER_CLEANUP_EVERY_SCANS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("WORKER_CLEANUP_EVERY_SCANS must be a valid u64");

        let retention_hours: u64 = std::env::var("WORKSPACE_RETENTION_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .expect("WORKSPACE_RETENTION_HOURS must be a valid u64");

        Self {
            paths: RuntimePaths::from_env(),
            commands: CommandSettings::from_env(),
            poll_interval: Duration::from_millis(poll_interval_ms),
            cooldown: Duration::from_secs(cooldown_secs),
            cleanup_every_scans: cleanup_every_scans.max(1),
            retention: Duration::from_secs(retention_hours * 3600),
        }
    }
}
