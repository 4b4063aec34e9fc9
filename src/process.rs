//! One-shot subprocess execution with a hard timeout.
//!
//! Installer strategies and the prerequisite check go through
//! [`CommandRunner`]; [`SystemRunner`] is the real implementation. Children are
//! spawned with `kill_on_drop(true)` so an interrupted run does not leave
//! package managers behind.

use std::fmt::Write;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Max captured bytes per stream.
pub const MAX_CAPTURE: usize = 256 * 1024;

/// A command to run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Shell-like rendering for display and logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of a command that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, or `-1` if unavailable (killed by signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("failed to spawn process: {0}")]
    Spawn(std::io::Error),
    #[error("process error: {0}")]
    Wait(std::io::Error),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Runs commands to completion under a timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, RunError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, RunError> {
        exec_command(spec, timeout).await
    }
}

/// Run `spec` with stdin closed, capturing both streams.
///
/// Stdout and stderr are drained concurrently so a chatty child cannot block
/// on a full pipe. The whole operation is bounded by `timeout`; on expiry the
/// child is dropped and therefore killed.
pub async fn exec_command(spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, RunError> {
    let start = Instant::now();
    log::debug!("exec: {}", spec.display());

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| spawn_error(&spec.program, e))?;
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let result = tokio::time::timeout(timeout, async {
        let (out, err) = tokio::join!(read_capped_opt(stdout.as_mut()), read_capped_opt(stderr.as_mut()));
        let status = child.wait().await.map_err(RunError::Wait)?;
        Ok::<_, RunError>(CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: out,
            stderr: err,
            duration: start.elapsed(),
        })
    })
    .await;

    match result {
        Ok(output) => {
            let output = output?;
            log::debug!(
                "exit {} after {:.2}s: {}",
                output.exit_code,
                output.duration.as_secs_f64(),
                spec.program
            );
            Ok(output)
        }
        Err(_) => Err(RunError::Timeout(timeout)),
    }
}

/// Map a spawn failure, separating "executable missing" from the rest.
pub fn spawn_error(program: &str, err: std::io::Error) -> RunError {
    if err.kind() == std::io::ErrorKind::NotFound {
        RunError::NotFound(program.to_string())
    } else {
        RunError::Spawn(err)
    }
}

async fn read_capped_opt<R: AsyncRead + Unpin>(reader: Option<&mut R>) -> String {
    match reader {
        Some(r) => read_capped(r, MAX_CAPTURE).await,
        None => String::new(),
    }
}

/// Read to EOF, keeping the first `max_bytes`.
///
/// Reading continues past the cap so the writer never sees a closed pipe.
pub async fn read_capped<R: AsyncRead + Unpin>(reader: &mut R, max_bytes: usize) -> String {
    let mut buf = Vec::with_capacity(max_bytes.min(65536));
    let mut tmp = [0u8; 8192];
    let mut total_read = 0usize;
    loop {
        match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                total_read += n;
                if buf.len() < max_bytes {
                    let take = n.min(max_bytes - buf.len());
                    buf.extend_from_slice(&tmp[..take]);
                }
            }
        }
    }
    let mut s = String::from_utf8_lossy(&buf).into_owned();
    if total_read > max_bytes {
        let _ = write!(s, "\n[truncated: {total_read} bytes total, showing first {max_bytes}]");
    }
    s
}

/// Read whatever arrives within `window`, without waiting for EOF.
pub async fn read_available<R: AsyncRead + Unpin>(reader: &mut R, window: Duration, max_bytes: usize) -> String {
    let deadline = tokio::time::Instant::now() + window;
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    while buf.len() < max_bytes {
        match tokio::time::timeout_at(deadline, reader.read(&mut tmp)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(n)) => {
                let take = n.min(max_bytes - buf.len());
                buf.extend_from_slice(&tmp[..take]);
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// First `n` non-blank lines, for console display.
pub fn head_lines(text: &str, n: usize) -> Vec<&str> {
    text.lines().filter(|l| !l.trim().is_empty()).take(n).collect()
}
