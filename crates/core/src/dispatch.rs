//! Request dispatch and `sequence` execution.
//!
//! A `sequence` runs its sub-requests strictly in order inside the parent's
//! workspace, so a later call can consume files an earlier one produced. A
//! failing element fills its own slot with an error and the remaining
//! elements still run; callers inspect every slot.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::registry::MethodRegistry;
use crate::rpc::{RpcRequest, RpcResponse};
use crate::workspace::Workspace;

/// Routes requests to the registry, expanding `sequence` calls.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Execute `request` inside `workspace` and build its response.
    ///
    /// Boxed because a `sequence` element may itself be a `sequence`.
    pub fn dispatch<'a>(
        &'a self,
        request: &'a RpcRequest,
        workspace: &'a Workspace,
    ) -> BoxFuture<'a, RpcResponse> {
        async move {
            if request.is_sequence() {
                let slots = self
                    .execute_sequence(request.sequence_items(), workspace)
                    .await;
                let result = Value::Array(slots.into_iter().map(RpcResponse::into_value).collect());
                return RpcResponse::success(request.id.clone(), result);
            }

            let result = self
                .registry
                .invoke(&request.method, &request.params, workspace)
                .await;
            if let Err(err) = &result {
                tracing::debug!(method = %request.method, code = err.code, error = %err.message, "Method returned an error");
            }
            RpcResponse::from_result(request.id.clone(), result)
        }
        .boxed()
    }

    /// Run each item in order, one at a time, and return one response per
    /// item, positionally aligned with the input.
    ///
    /// Items that do not decode as requests get an invalid-request slot.
    pub async fn execute_sequence(&self, items: &[Value], workspace: &Workspace) -> Vec<RpcResponse> {
        let mut slots = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let response = match RpcRequest::from_value(item.clone()) {
                Ok(sub) => self.dispatch(&sub, workspace).await,
                Err(err) => {
                    let id = item.get("id").cloned().unwrap_or(Value::Null);
                    RpcResponse::failure(id, err)
                }
            };

            if let Some(err) = response.error() {
                tracing::debug!(index, code = err.code, "Sequence element failed, continuing");
            }
            slots.push(response);
        }

        slots
    }
}
