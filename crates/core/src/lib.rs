//! Core of the RPC gateway: wire types, request authentication, method
//! dispatch, workspaces, and the durable job queue shared by the gateway and
//! the worker. No HTTP or process-supervision concerns live here.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod methods;
pub mod queue;
pub mod registry;
pub mod rpc;
pub mod signature;
pub mod subprocess;
pub mod workspace;
