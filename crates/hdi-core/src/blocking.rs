//! Blocking flavour of the mounter for callers without an async runtime.
//!
//! Argument building, output parsing and root selection are shared with
//! [`Mounter`](crate::Mounter); only process execution blocks the calling
//! thread. Auto-eject on shutdown is only offered by the async mounter.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hdi_schema::{Device, root_device};
use wait_timeout::ChildExt;

use crate::args::{AttachOptions, EjectOptions, attach_args, eject_args};
use crate::config::MounterConfig;
use crate::error::MountError;
use crate::mounter::{check_eject, interpret_attach};
use crate::runner::ProcessOutput;

/// Runs a tool to completion on the calling thread.
pub trait BlockingRunner: Send + Sync + std::fmt::Debug {
    /// Run `tool` with `args`, blocking until it exits.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Launch`] if the tool cannot be started.
    fn run(&self, tool: &Path, args: &[OsString]) -> Result<ProcessOutput, MountError>;
}

/// [`BlockingRunner`] backed by `std::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// A runner that kills the tool after `timeout`, if set.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join(reader: JoinHandle<std::io::Result<Vec<u8>>>) -> std::io::Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| std::io::Error::other("output reader panicked"))?
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Wait up to `limit` for `child`; on timeout or wait failure the child is
/// killed and reaped before returning.
fn wait_with_limit(
    child: &mut Child,
    tool: &Path,
    limit: Duration,
) -> Result<ExitStatus, MountError> {
    match child.wait_timeout(limit) {
        Ok(Some(status)) => Ok(status),
        Ok(None) => {
            kill_and_reap(child);
            Err(MountError::Timeout {
                tool: tool.to_path_buf(),
                after: limit,
            })
        }
        Err(e) => {
            kill_and_reap(child);
            Err(e.into())
        }
    }
}

impl BlockingRunner for SystemRunner {
    fn run(&self, tool: &Path, args: &[OsString]) -> Result<ProcessOutput, MountError> {
        tracing::debug!("Running {} {:?}", tool.display(), args);
        let mut child = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MountError::Launch {
                tool: tool.to_path_buf(),
                source,
            })?;

        // Read both pipes while waiting so a chatty tool can't fill them.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => wait_with_limit(&mut child, tool, limit)?,
            None => child.wait()?,
        };

        tracing::debug!("Status {:?}", status);
        let stderr = join(stderr)?;
        if !stderr.is_empty() {
            tracing::debug!("stderr: {}", String::from_utf8_lossy(&stderr).trim());
        }

        Ok(ProcessOutput {
            code: status.code(),
            stdout: join(stdout)?,
        })
    }
}

fn run_eject(
    runner: &dyn BlockingRunner,
    tool: &Path,
    target: &Path,
    options: EjectOptions,
) -> Result<(), MountError> {
    tracing::debug!("Ejecting {} (force: {})", target.display(), options.force);
    let output = runner.run(tool, &eject_args(target, options))?;
    check_eject(&output)
}

/// Blocking counterpart of [`Mounter`](crate::Mounter).
#[derive(Debug, Clone)]
pub struct BlockingMounter {
    tool: PathBuf,
    runner: Arc<dyn BlockingRunner>,
}

impl Default for BlockingMounter {
    fn default() -> Self {
        Self::new(&MounterConfig::default())
    }
}

impl BlockingMounter {
    /// Create a mounter that spawns the configured tool with `std::process`.
    pub fn new(config: &MounterConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner::with_timeout(config.timeout())))
    }

    /// Create a mounter that runs the tool through `runner`.
    pub fn with_runner(config: &MounterConfig, runner: Arc<dyn BlockingRunner>) -> Self {
        Self {
            tool: config.tool_path.clone(),
            runner,
        }
    }

    /// Attach a disk image.
    ///
    /// # Errors
    ///
    /// Same as [`Mounter::attach`](crate::Mounter::attach).
    pub fn attach(
        &self,
        file: impl AsRef<Path>,
        options: AttachOptions,
    ) -> Result<BlockingAttachResult, MountError> {
        let file = file.as_ref();
        tracing::debug!("Attaching {} ({:?})", file.display(), options);

        let output = self.runner.run(&self.tool, &attach_args(file, options))?;
        let (devices, root) = interpret_attach(&output)?;

        Ok(BlockingAttachResult {
            devices,
            tool: self.tool.clone(),
            runner: Arc::clone(&self.runner),
            target: Mutex::new(root),
        })
    }

    /// Eject a device node or mount point.
    ///
    /// # Errors
    ///
    /// Same as [`Mounter::eject`](crate::Mounter::eject).
    pub fn eject(&self, target: impl AsRef<Path>, options: EjectOptions) -> Result<(), MountError> {
        run_eject(self.runner.as_ref(), &self.tool, target.as_ref(), options)
    }
}

/// Devices produced by a blocking attach, with a one-shot eject.
#[derive(Debug)]
pub struct BlockingAttachResult {
    /// Devices in the order the tool reported them.
    pub devices: Vec<Device>,
    tool: PathBuf,
    runner: Arc<dyn BlockingRunner>,
    target: Mutex<Option<PathBuf>>,
}

impl BlockingAttachResult {
    /// The whole-disk device the eject is bound to.
    pub fn root_device(&self) -> Option<&Device> {
        root_device(&self.devices)
    }

    /// Device node [`eject`](Self::eject) will target, or `None` once used.
    pub fn target(&self) -> Option<PathBuf> {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Eject the root device; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Same as [`Mounter::eject`](crate::Mounter::eject).
    pub fn eject(&self, options: EjectOptions) -> Result<(), MountError> {
        let target = self
            .target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match target {
            Some(target) => run_eject(self.runner.as_ref(), &self.tool, &target, options),
            None => Ok(()),
        }
    }
}
