use anyhow::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Keeps a long-running component alive, restarting it with exponential
/// backoff until `shutdown` fires or `max_restarts` consecutive failures
/// open the circuit (`0` means unlimited).
pub(super) fn spawn_component_supervisor<F, Fut>(
    name: &'static str,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
    max_restarts: u32,
    shutdown: CancellationToken,
    mut run_component: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);
        let mut consecutive_failures: u32 = 0;

        loop {
            tracing::info!("Daemon component '{name}' starting");
            let outcome = tokio::select! {
                () = shutdown.cancelled() => return,
                outcome = run_component() => outcome,
            };
            if shutdown.is_cancelled() {
                return;
            }
            match outcome {
                Ok(()) => {
                    tracing::warn!("Daemon component '{name}' exited unexpectedly");
                    backoff = initial_backoff_secs.max(1);
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
                Err(e) => {
                    tracing::error!("Daemon component '{name}' failed: {e:#}");
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
            }

            if max_restarts > 0 && consecutive_failures > max_restarts {
                tracing::error!(
                    "Daemon component '{name}' exceeded max restarts ({max_restarts}), circuit open"
                );
                break;
            }
            tokio::select! {
                () = shutdown.cancelled() => return,
                () = tokio::time::sleep(Duration::from_secs(backoff)) => {}
            }
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}
