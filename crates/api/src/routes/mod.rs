pub mod health;
pub mod jsonrpc;
