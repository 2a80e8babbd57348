//! Mounter configuration
//!
//! Read-only once a mounter is built. Can be loaded from a TOML file:
//!
//! ```toml
//! tool_path = "/usr/bin/hdiutil"
//! timeout_ms = 60000
//! ```

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_TOOL;
use crate::error::ConfigError;

/// Settings shared by [`Mounter`](crate::Mounter) and
/// [`BlockingMounter`](crate::blocking::BlockingMounter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MounterConfig {
    /// Tool to run. A bare name is looked up on `PATH`.
    pub tool_path: PathBuf,

    /// Kill the tool if it runs longer than this many milliseconds.
    /// Unset means wait forever; zero is rejected.
    pub timeout_ms: Option<NonZeroU64>,
}

impl Default for MounterConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from(DEFAULT_TOOL),
            timeout_ms: None,
        }
    }
}

impl MounterConfig {
    /// Use a specific tool binary.
    pub fn with_tool_path(mut self, tool_path: impl Into<PathBuf>) -> Self {
        self.tool_path = tool_path.into();
        self
    }

    /// Set a per-invocation timeout.
    ///
    /// Kept at millisecond precision; anything shorter rounds up to 1ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms = Some(NonZeroU64::new(millis).unwrap_or(NonZeroU64::MIN));
        self
    }

    /// The timeout as a [`Duration`], if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(|ms| Duration::from_millis(ms.get()))
    }

    /// Parse a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on invalid TOML, unknown keys, or a
    /// zero timeout.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Toml`] if its contents are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
