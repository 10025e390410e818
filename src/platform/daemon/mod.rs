use crate::config::Config;
use crate::enforcement::Enforcement;
use crate::session::{Credentials, SessionSlot, SessionStatus};
use crate::store::PolicyStore;
use crate::transport::{BridgeConnector, SessionConnector};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod backup;
mod heartbeat_worker;
mod lifecycle;
mod state;
mod supervisor;

pub use lifecycle::SessionLifecycle;
pub use state::{DaemonStatus, state_file_path};

use state::spawn_state_writer;
use supervisor::spawn_component_supervisor;

const STATUS_FLUSH_SECONDS: u64 = 5;
const LIVENESS_MAX_RESTARTS: u32 = 10;

/// Runs the agent against the configured bridge until a termination signal.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let bridge_url = url::Url::parse(&config.session.bridge_url)
        .with_context(|| format!("parse bridge URL {}", config.session.bridge_url))?;
    let connector: Arc<dyn SessionConnector> = Arc::new(BridgeConnector::new(bridge_url));

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());
    run_with_connector(config, connector, shutdown).await
}

/// Startup sequence plus the session lifecycle. Errors before the lifecycle
/// starts (unreadable store or credentials) are fatal.
pub async fn run_with_connector(
    config: Arc<Config>,
    connector: Arc<dyn SessionConnector>,
    shutdown: CancellationToken,
) -> Result<()> {
    let store = Arc::new(PolicyStore::load(config.policy_store_path()).await?);
    let credentials = Credentials::load(&config.credentials_path())?;
    tracing::info!(records = credentials.len(), "credential state readable");

    let status = SessionStatus::new();
    let enforcement = Enforcement::new(
        config.enforcement.clone(),
        Arc::clone(&store),
        SessionSlot::new(),
        shutdown.clone(),
    );
    enforcement.resume_cooldowns();

    let mut handles: Vec<JoinHandle<()>> = vec![spawn_state_writer(
        state_file_path(&config),
        status.clone(),
        Arc::clone(&store),
        shutdown.clone(),
    )];
    if config.gateway.enabled {
        let host = config.gateway.host.clone();
        let port = config.gateway.port;
        let liveness_status = status.clone();
        let liveness_shutdown = shutdown.clone();
        handles.push(spawn_component_supervisor(
            "liveness",
            config.session.login_backoff_step_secs,
            config.session.login_backoff_max_secs,
            LIVENESS_MAX_RESTARTS,
            shutdown.clone(),
            move || {
                let host = host.clone();
                let status = liveness_status.clone();
                let shutdown = liveness_shutdown.clone();
                async move {
                    crate::transport::liveness::run_liveness(&host, port, status, shutdown).await
                }
            },
        ));
    }

    tracing::info!(
        connector = connector.name(),
        policies = store.len(),
        "grouplock started"
    );
    let lifecycle = SessionLifecycle::new(
        Arc::clone(&config),
        connector,
        enforcement,
        status,
        shutdown.clone(),
    );
    let result = lifecycle.run().await;

    shutdown.cancel();
    store.persist().await;
    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("grouplock stopped");

    result.map_err(anyhow::Error::from)
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("termination signal received; shutting down");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::warn!(%error, "SIGTERM handler unavailable; Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
