use crate::config::Config;
use crate::session::SessionStatus;
use crate::store::{PolicyStore, write_atomic};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Snapshot written next to config.toml for `grouplock status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub session: String,
    pub session_since: String,
    pub reconnects: u32,
    pub policies: usize,
    pub nickname_locks: usize,
    pub title_locks: usize,
    pub cooling_down: usize,
    pub written_at: String,
}

impl DaemonStatus {
    pub fn collect(status: &SessionStatus, store: &PolicyStore) -> Self {
        let snapshot = status.snapshot();
        let policies = store.snapshot();
        Self {
            session: snapshot.state.to_string(),
            session_since: snapshot.since.to_rfc3339(),
            reconnects: snapshot.reconnects,
            policies: policies.len(),
            nickname_locks: policies.values().filter(|p| p.enabled).count(),
            title_locks: policies
                .values()
                .filter(|p| p.locked_title().is_some())
                .count(),
            cooling_down: policies.values().filter(|p| p.cooldown).count(),
            written_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub fn state_file_path(config: &Config) -> PathBuf {
    config.base_dir().join("daemon_state.json")
}

pub(super) fn spawn_state_writer(
    path: PathBuf,
    status: SessionStatus,
    store: Arc<PolicyStore>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(super::STATUS_FLUSH_SECONDS));
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            write_status(&path, &status, &store).await;
        }
        write_status(&path, &status, &store).await;
    })
}

async fn write_status(path: &Path, status: &SessionStatus, store: &PolicyStore) {
    let snapshot = DaemonStatus::collect(status, store);
    let data = serde_json::to_vec_pretty(&snapshot).unwrap_or_else(|_| b"{}".to_vec());
    if let Err(error) = write_atomic(path, &data).await {
        tracing::warn!(%error, "failed to write daemon state file");
    }
}
