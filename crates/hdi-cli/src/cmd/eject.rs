//! Eject command

use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use hdi_core::{EjectOptions, Mounter, MounterConfig};

/// Eject a device node or mount point
pub async fn eject(config: &MounterConfig, target: &Path, force: bool) -> Result<()> {
    let mounter = Mounter::new(config);
    mounter
        .eject(target, EjectOptions { force })
        .await
        .with_context(|| format!("Failed to eject {}", target.display()))?;

    println!("{} {}", "ejected".green(), target.display());
    Ok(())
}
