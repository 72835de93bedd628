mod completion;
mod config;
mod dispatch;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use sdkpack_core::{Cpu, Platform};
use tracing_subscriber::EnvFilter;

use crate::dispatch::run_cli;

const LOG_ENV: &str = "SDKPACK_LOG";
const DEFAULT_LOG_FILTER: &str = "sdkpack=info";

#[derive(Parser, Debug)]
#[command(name = "sdkpack")]
#[command(about = "Download, cache and install JDK releases", long_about = None)]
pub(crate) struct Cli {
    /// Root for the cache, catalog and config (default ~/.sdkpack).
    #[arg(long, global = true)]
    prefix: Option<PathBuf>,
    /// Config file to read instead of <prefix>/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Install a release into a directory on this machine.
    Install {
        release_id: String,
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        accept_license: bool,
    },
    /// Print the platform and CPU this machine is classified as.
    Detect,
    /// List the releases in the catalog.
    List,
    /// Download a release bundle into the cache and print its path.
    Locate {
        release_id: String,
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        cpu: Option<Cpu>,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    init_tracing();
    run_cli(Cli::parse())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
