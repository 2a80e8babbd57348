//! hdi - attach and eject disk images

use anyhow::Result;
use clap::Parser;
use hdi_core::{AttachOptions, EjectOptions};
use tracing_subscriber::EnvFilter;

use hdi_cli::cmd;
use hdi_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `attach --json` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.mounter_config()?;
    tracing::debug!("Using {:?}", config);

    match cli.command {
        Commands::Attach {
            image,
            readonly,
            nobrowse,
            json,
            hold,
            force,
        } => {
            let options = AttachOptions { readonly, nobrowse };
            let hold = hold.then_some(EjectOptions { force });
            cmd::attach::attach(&config, &image, options, json, hold).await
        }
        Commands::Eject { target, force } => cmd::eject::eject(&config, &target, force).await,
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
