#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use rpcgate_core::config::{CommandSettings, RuntimePaths};
use rpcgate_core::dispatch::Dispatcher;
use rpcgate_core::error::RpcError;
use rpcgate_core::methods::Concatenate;
use rpcgate_core::queue::FsQueue;
use rpcgate_core::registry::{MethodRegistry, RpcMethod};
use rpcgate_core::signature::{Authenticator, SharedSecret};
use rpcgate_core::workspace::{Workspace, WorkspaceManager};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use rpcgate_api::config::{SecretSource, ServerConfig};
use rpcgate_api::router::build_app_router;
use rpcgate_api::state::AppState;

/// Secret shared by the test gateway and the test client.
pub const TEST_SECRET: &str = "ip-10-0-0-1.ec2.internal";

/// `ping` that counts its invocations.
pub struct SpyPing {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RpcMethod for SpyPing {
    async fn call(&self, _params: &[Value], _workspace: &Workspace) -> Result<Value, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Bool(true))
    }
}

/// A gateway wired to a temporary directory tree.
pub struct TestGateway {
    pub app: Router,
    pub ping_calls: Arc<AtomicUsize>,
    pub paths: RuntimePaths,
    _tmp: TempDir,
}

impl TestGateway {
    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn queue(&self) -> FsQueue {
        FsQueue::new(&self.paths.queue_dir)
    }
}

/// Build a test `ServerConfig` rooted at `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: 10 * 1024 * 1024,
        paths: RuntimePaths {
            workspace_root: root.join("workspaces"),
            queue_dir: root.join("queue"),
            worker_pid_file: root.join("worker.pid"),
            worker_log_file: root.join("worker.log"),
        },
        commands: CommandSettings::default(),
        secret: SecretSource::Static(SharedSecret::new(TEST_SECRET)),
    }
}

/// Build the full application router with a spy `ping`, and `cat` for
/// reading staged uploads back.
pub fn build_test_gateway() -> TestGateway {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let ping_calls = Arc::new(AtomicUsize::new(0));

    let registry = MethodRegistry::new()
        .register(
            "ping",
            SpyPing {
                calls: Arc::clone(&ping_calls),
            },
        )
        .register("cat", Concatenate);

    let state = AppState {
        config: Arc::new(config.clone()),
        authenticator: Arc::new(Authenticator::new(SharedSecret::new(TEST_SECRET))),
        dispatcher: Arc::new(Dispatcher::new(Arc::new(registry))),
        workspaces: Arc::new(WorkspaceManager::new(config.paths.workspace_root.clone())),
        queue: Arc::new(FsQueue::new(config.paths.queue_dir.clone())),
    };

    TestGateway {
        app: build_app_router(state, &config),
        ping_calls,
        paths: config.paths,
        _tmp: tmp,
    }
}

/// Signature a trusted client would compute for `body`.
pub fn sign(body: &[u8]) -> String {
    Authenticator::new(SharedSecret::new(TEST_SECRET)).sign(body)
}

/// Percent-encode a base64 tag for use in a query string.
pub fn encode_query_value(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D")
}

/// Query string carrying a valid signature for `body` plus `extra` options.
pub fn signed_query(body: &str, extra: &str) -> String {
    format!("signature={}{extra}", encode_query_value(&sign(body.as_bytes())))
}

/// POST `body` to `/jsonrpc?{query}`.
pub async fn post_rpc(app: Router, query: &str, body: impl Into<Body>) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/jsonrpc?{query}"))
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a multipart form with the `jsonrpc` part and file parts.
pub async fn post_multipart(
    app: Router,
    query: &str,
    rpc_body: &str,
    files: &[(&str, &str)],
) -> Response {
    let boundary = "rpcgate-test-boundary";
    let mut form = String::new();
    form.push_str(&format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"jsonrpc\"\r\n\r\n{rpc_body}\r\n"
    ));
    for (i, (file_name, contents)) in files.iter().enumerate() {
        form.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file{i}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n"
        ));
    }
    form.push_str(&format!("--{boundary}--\r\n"));

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/jsonrpc?{query}"))
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(form))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET `uri`.
pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
