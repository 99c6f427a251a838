//! Shell command execution.
//!
//! Every external tool (the engine, `img2webp`, `convert`, `montage`, `rm`)
//! is run through a [`CommandExecutor`], which takes one shell command line
//! and returns the combined stdout and stderr.

use async_trait::async_trait;
use colored::Colorize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{ExecError, ExecResult};

/// Default capture limit for stdout and stderr together (50 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 50 * 1024 * 1024;

/// Runs shell command lines.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `command`, failing on a non-zero exit status.
    async fn execute(&self, command: &str) -> ExecResult<String>;

    /// Runs `command`, turning a non-zero exit status into a warning.
    ///
    /// Spawn and capture errors are still returned.
    async fn execute_allow_failure(&self, command: &str) -> ExecResult<String> {
        match self.execute(command).await {
            Err(ExecError::CommandFailed {
                command,
                exit_code,
                output,
            }) => {
                eprintln!(
                    "{} `{}` exited with status {} (ignored)",
                    "warning:".yellow(),
                    command,
                    exit_code
                );
                Ok(output)
            }
            other => other,
        }
    }
}

/// Configuration for [`ShellExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Suppress echoing of captured output.
    pub quiet: bool,
    /// Echo each command line before running it.
    pub show_command: bool,
    /// Capture limit in bytes, shared by stdout and stderr.
    pub max_output_bytes: usize,
    /// Kill the command after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Working directory of spawned shells.
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            quiet: true,
            show_command: false,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            timeout: None,
            working_dir: None,
        }
    }
}

impl ExecutorConfig {
    /// Echo commands and their output when `debug` is set.
    pub fn debug(mut self, debug: bool) -> Self {
        self.quiet = !debug;
        self.show_command = debug;
        self
    }

    /// Sets the capture limit.
    pub fn max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = limit;
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }
}

/// Executes command lines through `sh -c` (`cmd /C` on Windows).
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    config: ExecutorConfig,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    async fn run(&self, command: &str) -> ExecResult<String> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let limit = self.config.max_output_bytes;
        let budget = AtomicUsize::new(limit);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let io_err = |source| ExecError::Io {
            command: command.to_string(),
            source,
        };

        let (stdout, stderr) =
            tokio::try_join!(read_capped(stdout, &budget), read_capped(stderr, &budget))
                .map_err(io_err)?;
        let status = child.wait().await.map_err(io_err)?;

        if stdout.truncated || stderr.truncated {
            return Err(ExecError::OutputTooLarge {
                command: command.to_string(),
                limit,
            });
        }

        let mut output = String::from_utf8_lossy(&stdout.data).into_owned();
        output.push_str(&String::from_utf8_lossy(&stderr.data));

        if !status.success() {
            return Err(ExecError::CommandFailed {
                command: command.to_string(),
                exit_code: status.code().unwrap_or(-1),
                output,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str) -> ExecResult<String> {
        if self.config.show_command {
            println!("{} {}", "$".dimmed(), command.cyan());
        }

        let output = match self.config.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run(command))
                .await
                .map_err(|_| ExecError::Timeout {
                    command: command.to_string(),
                    timeout_secs: timeout.as_secs(),
                })??,
            None => self.run(command).await?,
        };

        if !self.config.quiet && !output.trim().is_empty() {
            println!("{}", output.trim_end().dimmed());
        }
        Ok(output)
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[derive(Default)]
struct Captured {
    data: Vec<u8>,
    truncated: bool,
}

/// Reads the whole stream, keeping only what fits in the shared `budget`.
/// The rest is drained so the child never blocks on a full pipe.
async fn read_capped<R>(reader: Option<R>, budget: &AtomicUsize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let granted = take_budget(budget, n);
        captured.data.extend_from_slice(&buf[..granted]);
        captured.truncated |= granted < n;
    }
    Ok(captured)
}

/// Takes up to `wanted` bytes from `budget` and returns how many were granted.
fn take_budget(budget: &AtomicUsize, wanted: usize) -> usize {
    let mut granted = 0;
    let _ = budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
        granted = wanted.min(left);
        Some(left - granted)
    });
    granted
}
