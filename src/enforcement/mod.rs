//! Nickname and title enforcement on top of the scheduler.
//!
//! [`Enforcement`] owns the runtime pieces (gate, queues, watchdog) and the
//! shared handles (policy store, session slot). It is cheap to clone; every
//! worker and spawned command gets its own handle.

mod commands;
mod dispatch;
mod executor;
mod reactor;
mod sync;
mod watchdog;

pub use dispatch::Flow;
pub use executor::NicknameExecutor;
pub use watchdog::{TitleDecision, TitleState, TitleWatchdog};

use crate::config::EnforcementConfig;
use crate::scheduler::{Correction, DelayScheduler, GlobalGate, TaskQueues};
use crate::session::SessionSlot;
use crate::store::PolicyStore;
use crate::transport::MessagingSession;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Enforcement {
    config: Arc<EnforcementConfig>,
    store: Arc<PolicyStore>,
    gate: GlobalGate,
    delays: DelayScheduler,
    slot: SessionSlot,
    queues: TaskQueues,
    watchdog: Arc<TitleWatchdog>,
    shutdown: CancellationToken,
}

impl Enforcement {
    pub fn new(
        config: EnforcementConfig,
        store: Arc<PolicyStore>,
        slot: SessionSlot,
        shutdown: CancellationToken,
    ) -> Self {
        let config = Arc::new(config);
        let gate = GlobalGate::new(config.gate_capacity);
        let delays = DelayScheduler::from_config(&config);
        let executor = Arc::new(NicknameExecutor::new(
            Arc::clone(&config),
            Arc::clone(&store),
            gate.clone(),
            delays,
            slot.clone(),
            shutdown.clone(),
        ));
        let queues = TaskQueues::new(
            executor,
            Duration::from_millis(config.queue_pacing_ms),
            shutdown.clone(),
        );
        let watchdog = Arc::new(TitleWatchdog::new(
            Duration::from_secs(config.title_revert_delay_secs),
            config.max_conversations_per_tick,
        ));

        Self {
            config,
            store,
            gate,
            delays,
            slot,
            queues,
            watchdog,
            shutdown,
        }
    }

    pub fn config(&self) -> &EnforcementConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn gate(&self) -> &GlobalGate {
        &self.gate
    }

    pub fn queues(&self) -> &TaskQueues {
        &self.queues
    }

    pub fn watchdog(&self) -> &TitleWatchdog {
        &self.watchdog
    }

    pub fn slot(&self) -> &SessionSlot {
        &self.slot
    }

    /// The privileged identity: the configured operator, or the logged-in
    /// account when none is configured.
    pub fn operator_id(&self, session: &dyn MessagingSession) -> String {
        resolve_operator(&self.config, session)
    }

    /// Re-arms cooldown timers for policies persisted mid-cooldown, which
    /// would otherwise never leave it after a restart.
    pub fn resume_cooldowns(&self) {
        for (conversation_id, policy) in self.store.snapshot() {
            if policy.enabled && policy.cooldown {
                tracing::info!(conversation_id = %conversation_id, "re-arming nickname cooldown after restart");
                schedule_cooldown_reset(
                    &self.queues,
                    &conversation_id,
                    Duration::from_secs(self.config.nickname_cooldown_secs),
                    &self.shutdown,
                );
            }
        }
    }

    /// Queues a counted correction. The nickname itself is resolved from the
    /// policy when the task runs.
    fn enqueue_nickname(&self, conversation_id: &str, member_id: &str) {
        self.queues.enqueue(
            conversation_id,
            Correction::SetNickname {
                member_id: member_id.to_string(),
                counted: true,
            },
        );
    }

    /// Operator rename issued by an activation command; it does not advance
    /// the cooldown counter.
    fn enqueue_operator_activation(&self, conversation_id: &str, operator: &str) {
        self.queues.enqueue(
            conversation_id,
            Correction::SetNickname {
                member_id: operator.to_string(),
                counted: false,
            },
        );
    }
}

pub(crate) fn resolve_operator(config: &EnforcementConfig, session: &dyn MessagingSession) -> String {
    if config.operator_id.trim().is_empty() {
        session.own_user_id().to_string()
    } else {
        config.operator_id.trim().to_string()
    }
}

/// Sends [`Correction::ResetCooldown`] through the conversation queue once
/// `after` elapses. The queue drain stays the only writer of the counters.
pub(crate) fn schedule_cooldown_reset(
    queues: &TaskQueues,
    conversation_id: &str,
    after: Duration,
    shutdown: &CancellationToken,
) {
    let queues = queues.clone();
    let conversation_id = conversation_id.to_string();
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown.cancelled() => {}
            () = tokio::time::sleep(after) => {
                queues.enqueue(&conversation_id, Correction::ResetCooldown);
            }
        }
    });
}
