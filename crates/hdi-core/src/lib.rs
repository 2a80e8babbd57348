//! Attach and eject macOS disk images by driving `hdiutil`.
//!
//! # Overview
//!
//! [`Mounter::attach`] runs `hdiutil attach -plist`, parses the device list
//! it prints and hands back an [`AttachResult`] whose eject capability is
//! bound to the image's root device. Auto-eject on shutdown goes through an
//! injectable [`ShutdownHooks`] registry that the host application drains
//! once while shutting down.
//!
//! Process execution sits behind the [`ProcessRunner`] trait so tests (or
//! callers with unusual needs) can substitute their own runner. A blocking
//! flavour of the same API lives in [`blocking`].

pub mod args;
pub mod blocking;
pub mod config;
pub mod error;
pub mod mounter;
pub mod runner;
pub mod shutdown;

// Re-exports
pub use args::{AttachOptions, EjectOptions};
pub use config::MounterConfig;
pub use error::{ConfigError, MountError};
pub use hdi_schema::{Device, ParseError};
pub use mounter::{AttachResult, EjectHandle, Mounter};
pub use runner::{ProcessOutput, ProcessRunner, TokioRunner};
pub use shutdown::{HookId, ShutdownHooks};

/// Command used when no tool path is configured, resolved through `PATH`.
pub const DEFAULT_TOOL: &str = "hdiutil";
