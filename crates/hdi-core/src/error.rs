//! Error types for mounting and configuration

use std::path::PathBuf;
use std::time::Duration;

use hdi_schema::ParseError;
use thiserror::Error;

/// Errors surfaced by attach and eject operations.
#[derive(Error, Debug)]
pub enum MountError {
    /// The tool could not be started (e.g., not found on `PATH`).
    #[error("Failed to launch {}: {source}", .tool.display())]
    Launch {
        /// Tool that was invoked
        tool: PathBuf,
        /// Underlying spawn failure
        #[source]
        source: std::io::Error,
    },

    /// `hdiutil attach` exited with a non-zero code.
    #[error("hdiutil attach failed with exit code {code}")]
    AttachFailed {
        /// Exit code reported by the tool
        code: i32,
    },

    /// `hdiutil eject` exited with a non-zero code.
    #[error("hdiutil eject failed with exit code {code}")]
    EjectFailed {
        /// Exit code reported by the tool
        code: i32,
    },

    /// The attach succeeded but its output could not be interpreted.
    #[error("Unexpected attach output: {0}")]
    Parse(#[from] ParseError),

    /// The tool did not finish within the configured timeout and was killed.
    #[error("{} timed out after {after:?}", .tool.display())]
    Timeout {
        /// Tool that was invoked
        tool: PathBuf,
        /// Configured limit
        after: Duration,
    },

    /// Collecting the tool's output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a [`MounterConfig`](crate::MounterConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or has unknown keys.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
