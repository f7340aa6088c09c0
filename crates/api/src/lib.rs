//! JSON-RPC gateway library.
//!
//! Exposes the building blocks (config, state, error handling, intake,
//! routes) so integration tests and the binary entrypoint share them.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod intake;
pub mod options;
pub mod request_log;
pub mod router;
pub mod routes;
pub mod state;
