//! External program execution for command-backed methods.
//!
//! [`run_command`] spawns the program inside the caller's workspace, captures
//! stdout/stderr, and enforces a timeout. The child is spawned with
//! `kill_on_drop`, so dropping the future (e.g. a transport timeout) also
//! terminates the process.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB). Output past
/// this is read and discarded so the child never blocks or hits SIGPIPE.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
    /// Either stream exceeded the capture limit and was cut short.
    pub truncated: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {elapsed_ms}ms")]
    Timeout { program: String, elapsed_ms: u64 },

    #[error("I/O error while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `program args...` with `working_dir` as its current directory.
///
/// Stdin is closed. A non-zero exit is not an error here; callers inspect
/// [`CommandOutput::exit_code`].
pub async fn run_command(
    program: &str,
    args: &[String],
    working_dir: &Path,
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let (stdout_bytes, stdout_cut) = stdout_task.await.unwrap_or_default();
            let (stderr_bytes, stderr_cut) = stderr_task.await.unwrap_or_default();
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: start.elapsed().as_millis() as u64,
                truncated: stdout_cut || stderr_cut,
            })
        }
        Ok(Err(source)) => Err(CommandError::Wait {
            program: program.to_string(),
            source,
        }),
        // `child` drops here and `kill_on_drop` terminates it.
        Err(_elapsed) => Err(CommandError::Timeout {
            program: program.to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

/// Drain a stream to EOF, keeping at most [`MAX_OUTPUT_BYTES`]. The flag is
/// set when bytes were discarded.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut truncated = false;
    let Some(mut h) = handle else {
        return (buf, truncated);
    };

    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match h.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
                if n > room {
                    truncated = true;
                }
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    (buf, truncated)
}
