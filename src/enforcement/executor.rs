use super::schedule_cooldown_reset;
use crate::config::EnforcementConfig;
use crate::scheduler::{Correction, CorrectionHandler, DelayScheduler, GlobalGate, TaskQueues};
use crate::session::SessionSlot;
use crate::store::PolicyStore;
use anyhow::Context;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs queued nickname corrections against the current session.
///
/// One correction: take a gate slot, make the call, count it, persist, then
/// keep the slot for the paced delay so the next mutation anywhere waits.
pub struct NicknameExecutor {
    config: Arc<EnforcementConfig>,
    store: Arc<PolicyStore>,
    gate: GlobalGate,
    delays: DelayScheduler,
    slot: SessionSlot,
    shutdown: CancellationToken,
}

impl NicknameExecutor {
    pub fn new(
        config: Arc<EnforcementConfig>,
        store: Arc<PolicyStore>,
        gate: GlobalGate,
        delays: DelayScheduler,
        slot: SessionSlot,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            gate,
            delays,
            slot,
            shutdown,
        }
    }

    async fn set_nickname(
        &self,
        queues: &TaskQueues,
        conversation_id: &str,
        member_id: &str,
        counted: bool,
    ) -> anyhow::Result<()> {
        // The policy may have changed while this task waited in the queue, so
        // both the go-ahead and the nickname come from its current state.
        let Some(policy) = self
            .store
            .get(conversation_id)
            .filter(|policy| policy.accepts_nickname_corrections())
        else {
            tracing::debug!(conversation_id, member_id, "dropping stale nickname correction");
            return Ok(());
        };
        let nickname = policy
            .desired_nickname(member_id, &self.config.default_nickname)
            .to_string();

        let session = self.slot.require()?;
        let permit = self.gate.acquire().await?;
        session
            .set_nickname(conversation_id, member_id, &nickname)
            .await
            .with_context(|| format!("set nickname of {member_id} in {conversation_id}"))?;

        let count = if counted {
            let Some(outcome) = self
                .store
                .record_correction(conversation_id, self.config.nickname_change_limit)
            else {
                return Ok(());
            };
            if outcome.entered_cooldown {
                tracing::warn!(
                    conversation_id,
                    count = outcome.count,
                    cooldown_secs = self.config.nickname_cooldown_secs,
                    "nickname change limit reached; pausing corrections"
                );
                schedule_cooldown_reset(
                    queues,
                    conversation_id,
                    Duration::from_secs(self.config.nickname_cooldown_secs),
                    &self.shutdown,
                );
            }
            outcome.count
        } else {
            self.store.get(conversation_id).map_or(0, |policy| policy.count)
        };
        tracing::info!(conversation_id, member_id, nickname = %nickname, count, "nickname restored");
        self.store.persist().await;

        let delay = self.delays.delay(count);
        tokio::select! {
            () = self.shutdown.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
        drop(permit);
        Ok(())
    }

    async fn reset_cooldown(&self, conversation_id: &str) {
        if self.store.end_cooldown(conversation_id) {
            tracing::info!(conversation_id, "nickname cooldown over; counter reset");
            self.store.persist().await;
        }
    }
}

impl CorrectionHandler for NicknameExecutor {
    fn handle<'a>(
        &'a self,
        queues: &'a TaskQueues,
        conversation_id: &'a str,
        correction: Correction,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match correction {
                Correction::SetNickname { member_id, counted } => {
                    self.set_nickname(queues, conversation_id, &member_id, counted)
                        .await
                }
                Correction::ResetCooldown => {
                    self.reset_cooldown(conversation_id).await;
                    Ok(())
                }
            }
        })
    }
}
