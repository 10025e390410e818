use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `grouplock` - keeps nicknames and titles of group conversations locked.
#[derive(Parser, Debug)]
#[command(name = "grouplock")]
#[command(version)]
#[command(about = "Rate-limited nickname and title enforcement agent.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.grouplock/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Log in and enforce locks until terminated
    Run {
        /// Override the liveness port
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip the liveness endpoint
        #[arg(long)]
        no_liveness: bool,
    },

    /// Show configuration, stored policies and the last daemon status
    Status,

    /// Validate config, credentials and policy store without logging in
    Check,
}
