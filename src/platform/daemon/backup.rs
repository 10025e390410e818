use super::lifecycle::WorkerExit;
use crate::error::is_disconnect;
use crate::transport::MessagingSession;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodically exports the live cookie records to `path`.
pub(super) async fn run_backup_worker(
    session: Arc<dyn MessagingSession>,
    path: PathBuf,
    period: Duration,
    stop: CancellationToken,
) -> WorkerExit {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.cancelled() => return WorkerExit::Stopped,
            _ = interval.tick() => {}
        }

        let credentials = match session.export_credentials().await {
            Ok(credentials) => credentials,
            Err(error) if is_disconnect(&error) => {
                return WorkerExit::Reconnect(format!("credential backup: {error:#}"));
            }
            Err(error) => {
                tracing::warn!("credential export failed: {error:#}");
                continue;
            }
        };
        if credentials.is_empty() {
            tracing::warn!("credential export returned no records; keeping previous backup");
            continue;
        }
        match credentials.save(&path).await {
            Ok(()) => tracing::info!(
                path = %path.display(),
                records = credentials.len(),
                "credential state backed up"
            ),
            Err(error) => tracing::warn!("credential backup failed: {error:#}"),
        }
    }
}
