//! Route definitions for the JSON-RPC endpoint.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::jsonrpc;
use crate::state::AppState;

/// ```text
/// POST /jsonrpc                 -> handle
/// POST /cgi-bin/jsonrpc.py      -> handle (path used by existing clients)
/// ```
pub fn router(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/jsonrpc", post(jsonrpc::handle))
        .route("/cgi-bin/jsonrpc.py", post(jsonrpc::handle))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
