//! hdi - attach and eject disk images
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Thin command-line front end over `hdi-core`.
//!
//! Settings are resolved in order: built-in defaults, then `--config`
//! (a TOML [`MounterConfig`]), then `--tool` / `HDI_TOOL` and `--timeout-ms`.

pub mod cmd;

use std::num::NonZeroU64;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hdi_core::MounterConfig;

#[derive(Debug, Parser)]
#[command(name = "hdi")]
#[command(author, version, about = "hdi - attach and eject disk images")]
pub struct Cli {
    /// hdiutil binary to run
    #[arg(long, global = true, env = "HDI_TOOL")]
    pub tool: Option<PathBuf>,

    /// TOML file with mounter settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Kill hdiutil if it runs longer than this many milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<NonZeroU64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Attach a disk image and list its devices
    Attach {
        /// Disk image to attach
        image: PathBuf,
        /// Force the device to be read-only
        #[arg(long)]
        readonly: bool,
        /// Hide the volume from Finder
        #[arg(long)]
        nobrowse: bool,
        /// Print devices as JSON
        #[arg(long)]
        json: bool,
        /// Stay attached until Ctrl-C, then eject
        #[arg(long)]
        hold: bool,
        /// Force the eject performed by --hold
        #[arg(long, short = 'f', requires = "hold")]
        force: bool,
    },
    /// Eject a device node or mount point
    Eject {
        /// Device node (e.g. /dev/disk4) or mount point
        target: PathBuf,
        /// Detach even if files are open
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

impl Cli {
    /// Build the mounter config from defaults, the config file and flags.
    pub fn mounter_config(&self) -> Result<MounterConfig> {
        let mut config = match &self.config {
            Some(path) => MounterConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => MounterConfig::default(),
        };
        if let Some(tool) = &self.tool {
            config.tool_path.clone_from(tool);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = Some(ms);
        }
        Ok(config)
    }
}
