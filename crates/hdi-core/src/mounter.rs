//! Attach/eject orchestration

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use hdi_schema::{Device, parse_attach_response, root_device};

use crate::args::{AttachOptions, EjectOptions, attach_args, eject_args};
use crate::config::MounterConfig;
use crate::error::MountError;
use crate::runner::{ProcessOutput, ProcessRunner, TokioRunner};
use crate::shutdown::{HookId, ShutdownHooks};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Check an attach exit code, then parse its devices and pick the root.
pub(crate) fn interpret_attach(
    output: &ProcessOutput,
) -> Result<(Vec<Device>, Option<PathBuf>), MountError> {
    if let Some(code) = output.failed_code() {
        return Err(MountError::AttachFailed { code });
    }
    let devices = parse_attach_response(&output.stdout)?;
    let root = root_device(&devices).map(|d| PathBuf::from(&d.dev_entry));
    tracing::debug!("Attached {} device(s), root {:?}", devices.len(), root);
    Ok((devices, root))
}

pub(crate) fn check_eject(output: &ProcessOutput) -> Result<(), MountError> {
    match output.failed_code() {
        Some(code) => Err(MountError::EjectFailed { code }),
        None => Ok(()),
    }
}

async fn run_eject(
    runner: &dyn ProcessRunner,
    tool: &Path,
    target: &Path,
    options: EjectOptions,
) -> Result<(), MountError> {
    tracing::debug!("Ejecting {} (force: {})", target.display(), options.force);
    let output = runner.run(tool, &eject_args(target, options)).await?;
    check_eject(&output)
}

/// Attaches and ejects disk images through `hdiutil`.
///
/// Cheap to clone; clones share the runner and the shutdown registry.
#[derive(Debug, Clone)]
pub struct Mounter {
    tool: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    hooks: Arc<ShutdownHooks>,
}

impl Default for Mounter {
    fn default() -> Self {
        Self::new(&MounterConfig::default())
    }
}

impl Mounter {
    /// Create a mounter that spawns the configured tool with tokio.
    pub fn new(config: &MounterConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioRunner::with_timeout(config.timeout())))
    }

    /// Create a mounter that runs the tool through `runner`.
    pub fn with_runner(config: &MounterConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            tool: config.tool_path.clone(),
            runner,
            hooks: Arc::new(ShutdownHooks::new()),
        }
    }

    /// Register auto-ejects in a registry owned elsewhere.
    pub fn with_shutdown_hooks(mut self, hooks: Arc<ShutdownHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The tool this mounter runs.
    pub fn tool_path(&self) -> &Path {
        &self.tool
    }

    /// Registry holding pending auto-ejects. Drain it when shutting down.
    pub fn shutdown_hooks(&self) -> &Arc<ShutdownHooks> {
        &self.hooks
    }

    /// Attach a disk image.
    ///
    /// If `eject_on_shutdown` is set and the image produced a root device,
    /// an eject with those options is registered in the shutdown registry
    /// until the returned handle is used.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Launch`] if the tool cannot be started,
    /// [`MountError::AttachFailed`] on a non-zero exit (the output is not
    /// parsed in that case), or [`MountError::Parse`] if the output is not
    /// a valid attach response.
    pub async fn attach(
        &self,
        file: impl AsRef<Path>,
        options: AttachOptions,
        eject_on_shutdown: Option<EjectOptions>,
    ) -> Result<AttachResult, MountError> {
        let file = file.as_ref();
        tracing::debug!("Attaching {} ({:?})", file.display(), options);

        let output = self.runner.run(&self.tool, &attach_args(file, options)).await?;
        let (devices, root) = interpret_attach(&output)?;

        let handle = EjectHandle::new(self.tool.clone(), Arc::clone(&self.runner), root);
        if let Some(options) = eject_on_shutdown {
            handle.register_shutdown(&self.hooks, options);
        }

        Ok(AttachResult { devices, handle })
    }

    /// Eject a device node or mount point.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Launch`] if the tool cannot be started or
    /// [`MountError::EjectFailed`] on a non-zero exit.
    pub async fn eject(
        &self,
        target: impl AsRef<Path>,
        options: EjectOptions,
    ) -> Result<(), MountError> {
        run_eject(self.runner.as_ref(), &self.tool, target.as_ref(), options).await
    }
}

/// Devices produced by a successful attach, plus a handle to eject them.
#[derive(Debug)]
pub struct AttachResult {
    /// Devices in the order the tool reported them.
    pub devices: Vec<Device>,
    handle: EjectHandle,
}

impl AttachResult {
    /// The whole-disk device the eject handle is bound to.
    pub fn root_device(&self) -> Option<&Device> {
        root_device(&self.devices)
    }

    /// A clonable handle to eject the image later.
    pub fn eject_handle(&self) -> EjectHandle {
        self.handle.clone()
    }

    /// Eject the root device. See [`EjectHandle::eject`].
    ///
    /// # Errors
    ///
    /// Same as [`Mounter::eject`].
    pub async fn eject(&self, options: EjectOptions) -> Result<(), MountError> {
        self.handle.eject(options).await
    }
}

#[derive(Debug)]
struct EjectState {
    tool: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    target: Mutex<Option<PathBuf>>,
    hook: Mutex<Option<(Weak<ShutdownHooks>, HookId)>>,
}

impl EjectState {
    fn take_target(&self) -> Option<PathBuf> {
        lock(&self.target).take()
    }

    fn unregister_hook(&self) {
        let hook = lock(&self.hook).take();
        if let Some((hooks, id)) = hook.and_then(|(hooks, id)| Some((hooks.upgrade()?, id))) {
            hooks.unregister(id);
        }
    }

    async fn eject(&self, options: EjectOptions) -> Result<(), MountError> {
        let Some(target) = self.take_target() else {
            tracing::trace!("Eject skipped: nothing attached");
            return Ok(());
        };
        self.unregister_hook();
        run_eject(self.runner.as_ref(), &self.tool, &target, options).await
    }
}

/// One-shot eject capability bound to an image's root device.
///
/// Clones share state: once any clone (or the shutdown drain) has ejected,
/// every further call is a no-op.
#[derive(Debug, Clone)]
pub struct EjectHandle {
    state: Arc<EjectState>,
}

impl EjectHandle {
    fn new(tool: PathBuf, runner: Arc<dyn ProcessRunner>, target: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(EjectState {
                tool,
                runner,
                target: Mutex::new(target),
                hook: Mutex::new(None),
            }),
        }
    }

    fn register_shutdown(&self, hooks: &Arc<ShutdownHooks>, options: EjectOptions) {
        if self.target().is_none() {
            return;
        }
        let state = Arc::clone(&self.state);
        let id = hooks.register(move || async move { state.eject(options).await });
        *lock(&self.state.hook) = Some((Arc::downgrade(hooks), id));
    }

    /// Device node this handle will eject, or `None` once used.
    pub fn target(&self) -> Option<PathBuf> {
        lock(&self.state.target).clone()
    }

    /// Eject the root device.
    ///
    /// Does nothing if the handle was already used or the attach produced
    /// no devices. Otherwise the pending shutdown hook is dropped and the
    /// target cleared before the tool runs, so concurrent calls only eject
    /// once. A failed eject is not retried by later calls.
    ///
    /// # Errors
    ///
    /// Same as [`Mounter::eject`].
    pub async fn eject(&self, options: EjectOptions) -> Result<(), MountError> {
        self.state.eject(options).await
    }
}
