//! Built-in methods exposed by the gateway.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::CommandSettings;
use crate::error::{RpcError, EXECUTION_FAILED};
use crate::registry::{MethodRegistry, RpcMethod};
use crate::subprocess;
use crate::workspace::Workspace;

/// `ping` → `true`. Liveness check that touches nothing.
pub struct Ping;

#[async_trait]
impl RpcMethod for Ping {
    async fn call(&self, _params: &[Value], _workspace: &Workspace) -> Result<Value, RpcError> {
        Ok(Value::Bool(true))
    }
}

/// Runs a fixed program with the call's string params as arguments.
///
/// The result is the program's stdout. A non-zero exit reports
/// [`EXECUTION_FAILED`] with the exit code and stderr as data.
pub struct ExternalCommand {
    program: String,
    timeout: Duration,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RpcMethod for ExternalCommand {
    async fn call(&self, params: &[Value], workspace: &Workspace) -> Result<Value, RpcError> {
        let args = string_args(&self.program, params)?;

        let output = subprocess::run_command(&self.program, &args, workspace.path(), self.timeout)
            .await
            .map_err(|e| RpcError::new(EXECUTION_FAILED, e.to_string()))?;

        tracing::debug!(
            program = %self.program,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "External command finished"
        );
        if output.truncated {
            tracing::warn!(program = %self.program, "Command output exceeded the capture limit and was truncated");
        }

        if output.success() {
            Ok(Value::String(output.stdout))
        } else {
            Err(RpcError::new(
                EXECUTION_FAILED,
                format!("{} exited with status {}", self.program, output.exit_code),
            )
            .with_data(json!({
                "exit_code": output.exit_code,
                "stderr": output.stderr,
                "truncated": output.truncated,
            })))
        }
    }
}

/// `cat a b [> out]`: concatenate workspace files.
///
/// Without a redirect the result is the concatenated text. With a trailing
/// `>` and a file name the bytes are written to that workspace file and the
/// result is empty, the same as the shell form. Every path must stay inside
/// the workspace.
pub struct Concatenate;

#[async_trait]
impl RpcMethod for Concatenate {
    async fn call(&self, params: &[Value], workspace: &Workspace) -> Result<Value, RpcError> {
        let args = string_args("cat", params)?;
        let (inputs, output) = match args.as_slice() {
            [inputs @ .., redirect, target] if redirect == ">" => (inputs, Some(target)),
            all => (all, None),
        };
        if inputs.iter().any(|a| a == ">") {
            return Err(RpcError::invalid_params("cat redirect must be `> file` at the end"));
        }

        let target = output
            .map(|name| workspace_path(workspace, name).map(|path| (name, path)))
            .transpose()?;

        let mut contents = Vec::new();
        for name in inputs {
            let path = workspace_path(workspace, name)?;
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                RpcError::new(EXECUTION_FAILED, format!("cat: {name}: {e}"))
            })?;
            contents.extend_from_slice(&bytes);
        }

        match target {
            Some((name, path)) => {
                tokio::fs::write(&path, &contents).await.map_err(|e| {
                    RpcError::new(EXECUTION_FAILED, format!("cat: {name}: {e}"))
                })?;
                tracing::debug!(path = %path.display(), bytes = contents.len(), "Concatenated into file");
                Ok(Value::String(String::new()))
            }
            None => Ok(Value::String(String::from_utf8_lossy(&contents).into_owned())),
        }
    }
}

fn string_args(program: &str, params: &[Value]) -> Result<Vec<String>, RpcError> {
    params
        .iter()
        .map(|p| match p {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(RpcError::invalid_params(format!(
                "{program} arguments must be strings, got {other}"
            ))),
        })
        .collect()
}

/// Resolve a relative name inside the workspace, refusing anything that
/// could leave it.
fn workspace_path(workspace: &Workspace, name: &str) -> Result<PathBuf, RpcError> {
    let relative = Path::new(name);
    let contained = !name.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Err(RpcError::invalid_params(format!(
            "{name:?} is not a path inside the workspace"
        )));
    }
    Ok(workspace.path().join(relative))
}

/// The registry served by both gateway and worker.
pub fn builtin_registry(settings: &CommandSettings) -> MethodRegistry {
    MethodRegistry::new()
        .register("ping", Ping)
        .register("cat", Concatenate)
        .register(
            "curl",
            ExternalCommand::new(settings.curl_binary.clone(), settings.timeout),
        )
}
