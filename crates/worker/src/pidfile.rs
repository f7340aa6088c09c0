//! Pid file announcing a running worker.
//!
//! The gateway's health and diagnostics reports read it to tell whether async
//! jobs will be picked up.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PidFileError {
    /// Another worker owns the queue.
    #[error("Worker already running with pid {pid} ({})", path.display())]
    AlreadyRunning { pid: u32, path: PathBuf },

    #[error("Pid file {} unavailable: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Removes the pid file when dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claim `path` for the current process.
    ///
    /// Fails with [`PidFileError::AlreadyRunning`] while the recorded pid is
    /// alive; a file naming a dead process is replaced.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, PidFileError> {
        let path = path.into();
        let io_err = |source| PidFileError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        if let Some(pid) = recorded_pid(&path) {
            if process_alive(pid) {
                return Err(PidFileError::AlreadyRunning {
                    pid,
                    path: path.clone(),
                });
            }
            tracing::warn!(pid, path = %path.display(), "Replacing stale pid file");
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }

        // A concurrent start that won the race shows up as AlreadyExists.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match (e.kind(), recorded_pid(&path)) {
                (io::ErrorKind::AlreadyExists, Some(pid)) => PidFileError::AlreadyRunning {
                    pid,
                    path: path.clone(),
                },
                _ => io_err(e),
            })?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn recorded_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove pid file");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn writes_pid_and_removes_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run/worker.pid");

        let pid_file = PidFile::create(&path).unwrap();
        let contents = std::fs::read_to_string(pid_file.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn live_pid_blocks_a_second_worker() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let result = PidFile::create(&path);

        assert!(matches!(
            result,
            Err(PidFileError::AlreadyRunning { pid, .. }) if pid == std::process::id()
        ));
        assert!(path.exists(), "the running worker keeps its pid file");
    }

    #[test]
    fn second_claim_while_first_is_held_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("worker.pid");

        let _first = PidFile::create(&path).unwrap();
        assert!(matches!(
            PidFile::create(&path),
            Err(PidFileError::AlreadyRunning { .. })
        ));
    }

    #[test]
    fn garbage_pid_file_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, "not-a-pid").unwrap();

        let pid_file = PidFile::create(&path).unwrap();
        let contents = std::fs::read_to_string(pid_file.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn stale_file_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("worker.pid");
        std::fs::write(&path, "999999999\n").unwrap();

        let _pid_file = PidFile::create(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
