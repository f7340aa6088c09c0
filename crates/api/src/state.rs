use std::sync::Arc;

use rpcgate_core::dispatch::Dispatcher;
use rpcgate_core::methods::builtin_registry;
use rpcgate_core::queue::{FsQueue, JobQueue};
use rpcgate_core::signature::{Authenticator, SharedSecret};
use rpcgate_core::workspace::WorkspaceManager;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`. Nothing in here is mutable:
/// the filesystem is the only state shared between requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub authenticator: Arc<Authenticator>,
    pub dispatcher: Arc<Dispatcher>,
    pub workspaces: Arc<WorkspaceManager>,
    pub queue: Arc<dyn JobQueue>,
}

impl AppState {
    /// Wire the production components from configuration and the resolved secret.
    pub fn new(config: ServerConfig, secret: SharedSecret) -> Self {
        let registry = builtin_registry(&config.commands);
        let workspaces = WorkspaceManager::new(config.paths.workspace_root.clone());
        let queue = FsQueue::new(config.paths.queue_dir.clone());

        Self {
            authenticator: Arc::new(Authenticator::new(secret)),
            dispatcher: Arc::new(Dispatcher::new(Arc::new(registry))),
            workspaces: Arc::new(workspaces),
            queue: Arc::new(queue),
            config: Arc::new(config),
        }
    }
}
