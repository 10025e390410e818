use crate::app::status::render_status;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::platform::daemon::{self, DaemonStatus, state_file_path};
use crate::session::Credentials;
use crate::store::PolicyStore;
use anyhow::Result;
use std::sync::Arc;

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Commands::Run { port, no_liveness } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if no_liveness {
                config.gateway.enabled = false;
            }
            daemon::run(Arc::new(config)).await
        }
        Commands::Status => {
            let store = PolicyStore::load(config.policy_store_path()).await?;
            let daemon = DaemonStatus::read(&state_file_path(&config)).ok();
            println!("{}", render_status(&config, &store, daemon.as_ref()));
            Ok(())
        }
        Commands::Check => {
            let store = PolicyStore::load(config.policy_store_path()).await?;
            let credentials = Credentials::load(&config.credentials_path())?;
            println!("✓ config       {}", config.config_path.display());
            println!(
                "✓ credentials  {} ({} records)",
                config.credentials_path().display(),
                credentials.len()
            );
            println!(
                "✓ policy store {} ({} conversations)",
                store.path().display(),
                store.len()
            );
            Ok(())
        }
    }
}
