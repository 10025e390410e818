#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::{Context, Result};
use clap::Parser;
use grouplock::Config;
use grouplock::cli::Cli;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS.
    // Both the websocket client and reqwest go through rustls; without an
    // explicit provider rustls cannot pick one when several are compiled in.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();
    let config = Config::load_or_init(cli.config.as_deref())?;

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.observability.max_level())
        .with_ansi(config.observability.ansi)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    grouplock::app::dispatch::dispatch(cli, config).await
}
