//! Request handlers.
//!
//! Handlers map errors through [`GatewayError`](crate::error::GatewayError)
//! so every failure reaches the caller as a JSON-RPC error envelope.

pub mod jsonrpc;
