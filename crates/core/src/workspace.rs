//! Per-request working directories (workspaces).
//!
//! Every request executes inside exactly one workspace. Sync calls use it for
//! the duration of the call, async jobs carry its path through the queue, and
//! the worker's periodic sweep reclaims directories past the retention window.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Copy of the raw request body, written by the gateway.
pub const REQUEST_FILE: &str = "_request";
/// Copy of the dequeued job record, written by the worker.
pub const JOB_FILE: &str = "_job";
/// Outcome of an async job, written by the worker.
pub const RESPONSE_FILE: &str = "_response";
/// Optional request/result/environment log, written by the gateway.
pub const LOG_FILE: &str = "jsonrpc.log";

/// Caller-chosen workspace identifiers: a single path segment.
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Invalid workspace identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid upload file name: {0:?}")]
    InvalidFileName(String),

    #[error("Workspace {} unavailable: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A resolved workspace directory. It may not exist until
/// [`WorkspaceManager::ensure`] has run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file directly inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Write `contents` to `name` inside the workspace, replacing any
    /// previous file of that name.
    pub async fn write_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf, WorkspaceError> {
        let dest = self.file(name);
        tokio::fs::write(&dest, contents)
            .await
            .map_err(|e| WorkspaceError::io(&dest, e))?;
        Ok(dest)
    }
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Allocates and locates workspaces under a fixed root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the workspace for a request.
    ///
    /// - absolute path: used verbatim (explicit override)
    /// - identifier: `<root>/<identifier>`
    /// - nothing: `<root>/<fresh uuid>`, unique among live requests
    pub fn resolve(&self, requested: Option<&str>) -> Result<Workspace, WorkspaceError> {
        let Some(requested) = requested.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Workspace::new(
                self.root.join(uuid::Uuid::now_v7().simple().to_string()),
            ));
        };

        let path = Path::new(requested);
        if path.is_absolute() {
            return Ok(Workspace::new(path));
        }

        if !is_valid_identifier(requested) {
            return Err(WorkspaceError::InvalidIdentifier(requested.to_string()));
        }
        Ok(Workspace::new(self.root.join(requested)))
    }

    /// Create the workspace directory and its parents. Idempotent.
    pub async fn ensure(&self, workspace: &Workspace) -> Result<(), WorkspaceError> {
        tokio::fs::create_dir_all(workspace.path())
            .await
            .map_err(|e| WorkspaceError::io(workspace.path(), e))
    }

    /// Write an uploaded file part into the workspace under its plain file
    /// name, so methods can reference it without a directory prefix.
    pub async fn stage_file(
        &self,
        workspace: &Workspace,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf, WorkspaceError> {
        let name = upload_file_name(file_name)
            .ok_or_else(|| WorkspaceError::InvalidFileName(file_name.to_string()))?;
        workspace.write_file(name, contents).await
    }

    /// The most recently modified workspace under the root, if any.
    pub async fn newest(&self) -> Option<Workspace> {
        let mut entries = tokio::fs::read_dir(&self.root).await.ok()?;
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_dir() {
                continue;
            }
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().is_none_or(|(best, _)| mtime > *best) {
                newest = Some((mtime, entry.path()));
            }
        }

        newest.map(|(_, path)| Workspace::new(path))
    }

    /// Remove entries under the root whose modification time is older than
    /// `now - retention`.
    ///
    /// Blocking; callers on the async runtime should wrap it in
    /// `spawn_blocking`. Per-entry failures are counted, never propagated.
    pub fn sweep(&self, retention: Duration, now: SystemTime) -> CleanupReport {
        let mut report = CleanupReport::default();
        let Some(cutoff) = now.checked_sub(retention) else {
            return report;
        };

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    root = %self.root.display(),
                    error = %e,
                    "Workspace root not readable, nothing to sweep"
                );
                return report;
            }
        };

        for entry in entries.flatten() {
            report.scanned += 1;
            let path = entry.path();
            let Ok(metadata) = std::fs::symlink_metadata(&path) else {
                report.failed += 1;
                continue;
            };
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if mtime >= cutoff {
                continue;
            }

            let result = if metadata.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::debug!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove expired workspace"
                    );
                }
            }
        }

        report
    }
}

/// Returns `true` if `id` is usable as a single path segment under the root.
pub fn is_valid_identifier(id: &str) -> bool {
    id != "." && id != ".." && IDENTIFIER_RE.is_match(id)
}

/// Reduce a client-supplied upload name to a safe basename.
///
/// Returns `None` for empty, hidden, or traversal names.
pub fn upload_file_name(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base.starts_with('.') {
        return None;
    }
    Some(base)
}
