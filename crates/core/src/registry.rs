//! Method registry: maps a method name to an invocable operation.
//!
//! Methods receive the workspace explicitly; nothing relies on the process
//! current directory, so concurrent calls never race on it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RpcError;
use crate::workspace::Workspace;

/// A single invocable operation.
#[async_trait]
pub trait RpcMethod: Send + Sync {
    async fn call(&self, params: &[Value], workspace: &Workspace) -> Result<Value, RpcError>;
}

/// Name → method table.
///
/// `sequence` is handled by the dispatcher and can never be registered.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, Arc<dyn RpcMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method` under `name`, replacing any previous entry.
    pub fn register(mut self, name: impl Into<String>, method: impl RpcMethod + 'static) -> Self {
        let name = name.into();
        if name == crate::rpc::SEQUENCE_METHOD {
            tracing::warn!("Ignoring registration of reserved method name 'sequence'");
            return self;
        }
        self.methods.insert(name, Arc::new(method));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Call `name`, or report method-not-found.
    pub async fn invoke(
        &self,
        name: &str,
        params: &[Value],
        workspace: &Workspace,
    ) -> Result<Value, RpcError> {
        match self.methods.get(name) {
            Some(method) => method.call(params, workspace).await,
            None => Err(RpcError::method_not_found(name)),
        }
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
