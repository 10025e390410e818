use super::lifecycle::WorkerExit;
use crate::error::is_disconnect;
use crate::store::PolicyStore;
use crate::transport::MessagingSession;
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Idle prevention: a presence signal to every enforced conversation each
/// period. A disconnect answer ends the session.
pub(super) async fn run_heartbeat_worker(
    session: Arc<dyn MessagingSession>,
    store: Arc<PolicyStore>,
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

        let conversations = store.enforced();
        let mut delivered = 0usize;
        for conversation_id in &conversations {
            match session.send_presence(conversation_id).await {
                Ok(()) => delivered += 1,
                Err(error) if is_disconnect(&error) => {
                    return WorkerExit::Reconnect(format!("heartbeat: {error:#}"));
                }
                Err(error) => {
                    tracing::warn!(conversation_id = %conversation_id, "heartbeat failed: {error:#}");
                }
            }
        }
        tracing::debug!(delivered, total = conversations.len(), "heartbeat sent");
    }
}
