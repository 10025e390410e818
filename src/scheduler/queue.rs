use futures_util::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Typed corrective work for one conversation. The drain loop is the only
/// place these are executed, which makes it the sole mutator of a
/// conversation's counters.
#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Correction {
    /// Restore `member_id` to whatever the policy enforces when the task
    /// runs. `counted` corrections advance the cooldown counter.
    SetNickname { member_id: String, counted: bool },
    /// Cooldown timer fired: clear the flag and reset the counter.
    ResetCooldown,
}

impl Correction {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Executes one [`Correction`]. Receives the queue handle so follow-up work
/// (cooldown expiry) can be scheduled without owning the queue.
pub trait CorrectionHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        queues: &'a TaskQueues,
        conversation_id: &'a str,
        correction: Correction,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

#[derive(Debug, Default)]
struct ConversationQueue {
    tasks: VecDeque<Correction>,
    running: bool,
}

struct QueueState {
    handler: Arc<dyn CorrectionHandler>,
    pacing: Duration,
    shutdown: CancellationToken,
    queues: Mutex<HashMap<String, ConversationQueue>>,
}

/// Per-conversation serialized queues. At most one drain loop runs per
/// conversation; it exits when the queue empties and the next enqueue starts
/// a fresh one.
#[derive(Clone)]
pub struct TaskQueues {
    state: Arc<QueueState>,
}

impl TaskQueues {
    pub fn new(
        handler: Arc<dyn CorrectionHandler>,
        pacing: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: Arc::new(QueueState {
                handler,
                pacing,
                shutdown,
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConversationQueue>> {
        self.state
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `correction` and starts a drain loop if none is running. A
    /// correction identical to one still waiting is coalesced into it.
    pub fn enqueue(&self, conversation_id: &str, correction: Correction) {
        if self.state.shutdown.is_cancelled() {
            tracing::debug!(conversation_id, "shutdown in progress; dropping correction");
            return;
        }

        let start_drain = {
            let mut queues = self.lock();
            let queue = queues.entry(conversation_id.to_string()).or_default();
            if queue.tasks.contains(&correction) {
                tracing::debug!(conversation_id, kind = correction.kind(), "correction already queued");
                return;
            }
            queue.tasks.push_back(correction);
            !std::mem::replace(&mut queue.running, true)
        };

        if start_drain {
            let queues = self.clone();
            let conversation_id = conversation_id.to_string();
            tokio::spawn(async move { queues.drain(conversation_id).await });
        }
    }

    /// Tasks waiting (not yet started) for `conversation_id`.
    pub fn pending(&self, conversation_id: &str) -> usize {
        self.lock()
            .get(conversation_id)
            .map_or(0, |queue| queue.tasks.len())
    }

    pub fn is_draining(&self, conversation_id: &str) -> bool {
        self.lock()
            .get(conversation_id)
            .is_some_and(|queue| queue.running)
    }

    fn next_task(&self, conversation_id: &str) -> Option<Correction> {
        let mut queues = self.lock();
        let queue = queues.get_mut(conversation_id)?;
        if self.state.shutdown.is_cancelled() {
            queue.tasks.clear();
        }
        let next = queue.tasks.pop_front();
        if next.is_none() {
            queue.running = false;
        }
        next
    }

    async fn drain(self, conversation_id: String) {
        while let Some(correction) = self.next_task(&conversation_id) {
            let kind = correction.kind();
            let run = self
                .state
                .handler
                .handle(&self, &conversation_id, correction);
            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(conversation_id = %conversation_id, kind, "corrective task failed: {error:#}");
                }
                Err(_) => {
                    tracing::error!(conversation_id = %conversation_id, kind, "corrective task panicked");
                }
            }
            tokio::time::sleep(self.state.pacing).await;
        }
    }
}
