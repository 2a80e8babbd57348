//! Process execution seam
//!
//! The mounter never spawns processes directly; it goes through a
//! [`ProcessRunner`]. [`TokioRunner`] is the production implementation.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::MountError;

/// Result of running the tool to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if the platform reported none.
    pub code: Option<i32>,

    /// Everything the tool wrote to stdout.
    pub stdout: Vec<u8>,
}

impl ProcessOutput {
    /// A zero exit with the given stdout.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
        }
    }

    /// A failed exit with no output.
    pub fn failure(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
        }
    }

    /// The non-zero exit code, if the run failed.
    ///
    /// A missing exit code counts as success.
    pub fn failed_code(&self) -> Option<i32> {
        self.code.filter(|code| *code != 0)
    }
}

/// Runs a tool with arguments and collects its exit code and stdout.
#[async_trait]
pub trait ProcessRunner: Send + Sync + std::fmt::Debug {
    /// Run `tool` with `args`, waiting for it to exit.
    async fn run(&self, tool: &Path, args: &[OsString]) -> Result<ProcessOutput, MountError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// Stdin is closed, stdout is buffered in full, and stderr is captured and
/// logged at debug level.
#[derive(Debug, Clone, Default)]
pub struct TokioRunner {
    timeout: Option<Duration>,
}

impl TokioRunner {
    /// A runner that waits as long as the tool takes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner that kills the tool after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for TokioRunner {
    async fn run(&self, tool: &Path, args: &[OsString]) -> Result<ProcessOutput, MountError> {
        let mut cmd = Command::new(tool);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Running {} {:?}", tool.display(), args);
        let child = cmd.spawn().map_err(|source| MountError::Launch {
            tool: tool.to_path_buf(),
            source,
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| MountError::Timeout {
                    tool: tool.to_path_buf(),
                    after: limit,
                })??,
            None => child.wait_with_output().await?,
        };

        tracing::debug!("Status {:?}", output.status);
        if !output.stderr.is_empty() {
            tracing::debug!("stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
        }

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
        })
    }
}
