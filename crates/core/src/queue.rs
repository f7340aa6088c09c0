//! Durable single-consumer job queue.
//!
//! [`FsQueue`] keeps one file per pending job in a shared directory. Many
//! gateway requests produce; exactly one worker consumes. Consistency relies
//! on filesystem atomicity, not in-process locks:
//!
//! - enqueue writes a hidden staging file, then hard-links it to the final
//!   name. Linking never clobbers, so a name collision fails loudly.
//! - dequeue picks the oldest entry by `(mtime, file name)`, reads it, and
//!   deletes it *before* the job is decoded or handed out. A crash during
//!   execution therefore loses the job instead of running it twice
//!   (at-most-once).
//!
//! Deleting a queue file before the worker reaches it is how an operator
//! cancels queued work. An entry that cannot be read is renamed to a hidden
//! `.failed-<id>` name so it never blocks the entries behind it.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::rpc::RpcRequest;
use crate::workspace::{self, Workspace};

/// Prefix of in-flight staging files. Entries with a leading dot are never
/// considered pending.
const STAGING_PREFIX: &str = ".staging-";

/// Prefix given to entries that could not be read.
const FAILED_PREFIX: &str = ".failed-";

/// A unit of async work: which request to run, and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub workspace: Workspace,
    pub request: RpcRequest,
}

/// Identity of an enqueued job, returned to the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: String,
    pub path: PathBuf,
}

/// A job that has already been removed from the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DequeuedJob {
    pub id: String,
    pub job: Job,
}

/// A pending entry as seen by diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct PendingEntry {
    pub id: String,
    pub modified: DateTime<Utc>,
    pub contents: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue entry {id} already exists")]
    Collision { id: String },

    #[error("Invalid queue entry name: {0:?}")]
    InvalidId(String),

    #[error("Failed to serialize job: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The entry was removed but could not be decoded; the job is lost.
    #[error("Queue entry {id} is not a valid job: {source}")]
    Poison {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The entry could not be read and was moved aside to `quarantined`.
    #[error("Queue entry {id} is unreadable, moved to {}: {source}", quarantined.display())]
    Unreadable {
        id: String,
        quarantined: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Queue I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl QueueError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Multi-producer, single-consumer mailbox.
///
/// Gateway and worker only talk to this trait, so the directory-backed
/// implementation can be swapped without touching either.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist `job` under a fresh unique name.
    async fn enqueue(&self, job: &Job) -> Result<JobHandle, QueueError>;

    /// Remove and return the oldest pending job, or `None` when empty.
    async fn dequeue_oldest(&self) -> Result<Option<DequeuedJob>, QueueError>;

    /// List pending entries without consuming them.
    async fn pending(&self) -> Result<Vec<PendingEntry>, QueueError>;
}

/// Directory-backed [`JobQueue`].
#[derive(Debug, Clone)]
pub struct FsQueue {
    dir: PathBuf,
}

impl FsQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Enqueue under an explicit name. Fails with [`QueueError::Collision`]
    /// if an entry of that name is already pending; never retried.
    pub async fn enqueue_as(&self, id: &str, job: &Job) -> Result<JobHandle, QueueError> {
        if id.starts_with('.') || !workspace::is_valid_identifier(id) {
            return Err(QueueError::InvalidId(id.to_string()));
        }

        let body = serde_json::to_vec(job).map_err(QueueError::Serialize)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| QueueError::io(&self.dir, e))?;

        let staging = self.dir.join(format!(
            "{STAGING_PREFIX}{id}-{}",
            uuid::Uuid::new_v4().simple()
        ));
        write_new_file(&staging, &body).await?;

        let final_path = self.dir.join(id);
        let linked = tokio::fs::hard_link(&staging, &final_path).await;
        if let Err(e) = tokio::fs::remove_file(&staging).await {
            tracing::warn!(path = %staging.display(), error = %e, "Failed to remove queue staging file");
        }

        match linked {
            Ok(()) => Ok(JobHandle {
                id: id.to_string(),
                path: final_path,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(QueueError::Collision { id: id.to_string() })
            }
            Err(e) => Err(QueueError::io(&final_path, e)),
        }
    }

    /// Move an unreadable entry out of the pending set.
    ///
    /// Renaming only needs write access to the directory, so it works even
    /// when the entry itself is not readable by this process.
    async fn quarantine(&self, id: &str, source: std::io::Error) -> QueueError {
        let path = self.dir.join(id);
        let quarantined = self.dir.join(format!("{FAILED_PREFIX}{id}"));
        if let Err(e) = tokio::fs::rename(&path, &quarantined).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        return QueueError::io(&path, e);
                    }
                }
            }
        }
        tracing::warn!(id, path = %quarantined.display(), error = %source, "Quarantined unreadable queue entry");
        QueueError::Unreadable {
            id: id.to_string(),
            quarantined,
            source,
        }
    }

    /// Pending entry names with their mtimes, oldest first, ties by name.
    async fn scan(&self) -> Result<Vec<(SystemTime, String)>, QueueError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(QueueError::io(&self.dir, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| QueueError::io(&self.dir, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            // Symlinks count as entries so a broken one gets quarantined
            // instead of silently lingering.
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if metadata.is_dir() {
                continue;
            }
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((mtime, name));
        }

        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl JobQueue for FsQueue {
    async fn enqueue(&self, job: &Job) -> Result<JobHandle, QueueError> {
        let id = uuid::Uuid::now_v7().simple().to_string();
        self.enqueue_as(&id, job).await
    }

    async fn dequeue_oldest(&self) -> Result<Option<DequeuedJob>, QueueError> {
        for (_, id) in self.scan().await? {
            let path = self.dir.join(&id);

            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                // Deleted between scan and read: cancelled by an operator.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(self.quarantine(&id, source).await),
            };

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(QueueError::io(&path, e)),
            }

            let job = serde_json::from_slice(&contents)
                .map_err(|source| QueueError::Poison {
                    id: id.clone(),
                    source,
                })?;
            return Ok(Some(DequeuedJob { id, job }));
        }

        Ok(None)
    }

    async fn pending(&self) -> Result<Vec<PendingEntry>, QueueError> {
        let mut listing = Vec::new();
        for (mtime, id) in self.scan().await? {
            let Ok(contents) = tokio::fs::read(self.dir.join(&id)).await else {
                continue;
            };
            listing.push(PendingEntry {
                id,
                modified: DateTime::<Utc>::from(mtime),
                contents: String::from_utf8_lossy(&contents).into_owned(),
            });
        }
        Ok(listing)
    }
}

async fn write_new_file(path: &Path, body: &[u8]) -> Result<(), QueueError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| QueueError::io(path, e))?;
    file.write_all(body).await.map_err(|e| QueueError::io(path, e))?;
    file.sync_all().await.map_err(|e| QueueError::io(path, e))
}
