use super::Enforcement;
use crate::transport::MessagingSession;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Per-conversation title revert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleState {
    #[default]
    Stable,
    /// Divergence first seen at `at`; reverted once the grace window passes.
    Detected { at: Instant },
    Reverting,
}

/// What a poll observation asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleDecision {
    InSync,
    /// First sighting of a divergence.
    Detected,
    /// Still divergent, grace window not over.
    Waiting,
    /// Grace window over; caller must revert and then call
    /// [`TitleWatchdog::finish_revert`].
    Revert,
    /// A revert is already in flight.
    Busy,
}

#[derive(Debug, Default)]
struct WatchdogState {
    titles: HashMap<String, TitleState>,
    cursor: usize,
}

/// Debounced title enforcement. Renames are never fought immediately: a
/// divergence must survive `revert_delay` before the poll tick reverts it.
#[derive(Debug)]
pub struct TitleWatchdog {
    revert_delay: Duration,
    per_tick: usize,
    state: Mutex<WatchdogState>,
}

impl TitleWatchdog {
    pub fn new(revert_delay: Duration, per_tick: usize) -> Self {
        Self {
            revert_delay,
            per_tick: per_tick.max(1),
            state: Mutex::new(WatchdogState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self, conversation_id: &str) -> TitleState {
        self.lock()
            .titles
            .get(conversation_id)
            .copied()
            .unwrap_or_default()
    }

    /// Applies one poll observation.
    pub fn observe(
        &self,
        conversation_id: &str,
        current: Option<&str>,
        desired: &str,
        now: Instant,
    ) -> TitleDecision {
        let mut state = self.lock();
        let entry = state
            .titles
            .entry(conversation_id.to_string())
            .or_default();

        if current == Some(desired) {
            if *entry == TitleState::Reverting {
                return TitleDecision::Busy;
            }
            *entry = TitleState::Stable;
            return TitleDecision::InSync;
        }

        match *entry {
            TitleState::Stable => {
                *entry = TitleState::Detected { at: now };
                TitleDecision::Detected
            }
            TitleState::Detected { at } if now.saturating_duration_since(at) >= self.revert_delay => {
                *entry = TitleState::Reverting;
                TitleDecision::Revert
            }
            TitleState::Detected { .. } => TitleDecision::Waiting,
            TitleState::Reverting => TitleDecision::Busy,
        }
    }

    /// Real-time rename notification. Only starts the grace window; the
    /// revert itself still waits for a poll tick.
    pub fn note_rename(&self, conversation_id: &str, title: &str, desired: &str, now: Instant) {
        let mut state = self.lock();
        let entry = state
            .titles
            .entry(conversation_id.to_string())
            .or_default();
        match *entry {
            TitleState::Stable if title != desired => *entry = TitleState::Detected { at: now },
            TitleState::Detected { .. } if title == desired => *entry = TitleState::Stable,
            _ => {}
        }
    }

    /// Ends a revert attempt, successful or not.
    pub fn finish_revert(&self, conversation_id: &str) {
        self.lock()
            .titles
            .insert(conversation_id.to_string(), TitleState::Stable);
    }

    pub fn reset(&self, conversation_id: &str) {
        self.lock().titles.remove(conversation_id);
    }

    /// Picks at most `per_tick` conversations, rotating through `ids` across
    /// ticks so every conversation is eventually polled.
    pub fn select_batch(&self, ids: &[String]) -> Vec<String> {
        if ids.len() <= self.per_tick {
            return ids.to_vec();
        }
        let mut state = self.lock();
        let start = state.cursor % ids.len();
        state.cursor = (start + self.per_tick) % ids.len();
        ids.iter()
            .cycle()
            .skip(start)
            .take(self.per_tick)
            .cloned()
            .collect()
    }
}

impl Enforcement {
    /// One watchdog tick over the title-locked conversations.
    pub async fn poll_titles(&self) {
        let locked = self.store.title_locked();
        if locked.is_empty() {
            return;
        }
        let Some(session) = self.slot.current() else {
            return;
        };
        for conversation_id in self.watchdog.select_batch(&locked) {
            self.check_title(session.as_ref(), &conversation_id).await;
        }
    }

    async fn check_title(&self, session: &dyn MessagingSession, conversation_id: &str) {
        let snapshot = match session.thread_snapshot(conversation_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(conversation_id, "title check skipped: {error:#}");
                return;
            }
        };
        // Re-read: the lock may have been lifted while the fetch was in flight.
        let Some(desired) = self
            .store
            .get(conversation_id)
            .and_then(|policy| policy.locked_title().map(str::to_string))
        else {
            return;
        };

        let decision = self.watchdog.observe(
            conversation_id,
            snapshot.title.as_deref(),
            &desired,
            Instant::now(),
        );
        match decision {
            TitleDecision::Detected => tracing::info!(
                conversation_id,
                observed = snapshot.title.as_deref().unwrap_or_default(),
                desired = %desired,
                "title divergence detected"
            ),
            TitleDecision::Revert => {
                let enforcement = self.clone();
                let conversation_id = conversation_id.to_string();
                tokio::spawn(async move {
                    enforcement.revert_title(&conversation_id, &desired).await;
                });
            }
            TitleDecision::InSync | TitleDecision::Waiting | TitleDecision::Busy => {}
        }
    }

    /// Direct gated title set. Always leaves the watchdog `Stable`.
    pub(crate) async fn revert_title(&self, conversation_id: &str, title: &str) {
        if let Err(error) = self.apply_title(conversation_id, title).await {
            tracing::warn!(conversation_id, "title revert failed: {error:#}");
        }
    }

    pub(crate) async fn apply_title(&self, conversation_id: &str, title: &str) -> anyhow::Result<()> {
        let result = async {
            let session = self.slot.require()?;
            let permit = self.gate.acquire().await?;
            let applied = session.set_title(conversation_id, title).await;
            self.watchdog.finish_revert(conversation_id);
            applied?;
            tracing::info!(conversation_id, title, "title restored");

            let count = self
                .store
                .get(conversation_id)
                .map_or(0, |policy| policy.count);
            tokio::select! {
                () = self.shutdown.cancelled() => {}
                () = tokio::time::sleep(self.delays.delay(count)) => {}
            }
            drop(permit);
            anyhow::Ok(())
        }
        .await;
        if result.is_err() {
            self.watchdog.finish_revert(conversation_id);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::test_support::{fast_config, harness};
    use crate::store::Policy;

    const DELAY: Duration = Duration::from_secs(47);

    #[tokio::test(start_paused = true)]
    async fn revert_waits_for_the_full_grace_window() {
        let watchdog = TitleWatchdog::new(DELAY, 10);
        let t0 = Instant::now();

        assert_eq!(
            watchdog.observe("g", Some("Y"), "X", t0),
            TitleDecision::Detected
        );
        let early = t0 + DELAY - Duration::from_millis(1);
        assert_eq!(watchdog.observe("g", Some("Y"), "X", early), TitleDecision::Waiting);
        let late = t0 + DELAY + Duration::from_millis(1);
        assert_eq!(watchdog.observe("g", Some("Y"), "X", late), TitleDecision::Revert);
        assert_eq!(watchdog.observe("g", Some("Y"), "X", late), TitleDecision::Busy);

        watchdog.finish_revert("g");
        assert_eq!(watchdog.state("g"), TitleState::Stable);
    }

    #[tokio::test(start_paused = true)]
    async fn matching_title_clears_detection() {
        let watchdog = TitleWatchdog::new(DELAY, 10);
        let t0 = Instant::now();
        watchdog.observe("g", Some("Y"), "X", t0);

        assert_eq!(watchdog.observe("g", Some("X"), "X", t0), TitleDecision::InSync);
        assert_eq!(watchdog.state("g"), TitleState::Stable);
        // A fresh divergence restarts the window.
        assert_eq!(
            watchdog.observe("g", Some("Y"), "X", t0 + DELAY * 2),
            TitleDecision::Detected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rename_notification_only_starts_the_window() {
        let watchdog = TitleWatchdog::new(DELAY, 10);
        let t0 = Instant::now();
        watchdog.note_rename("g", "Y", "X", t0);
        assert_eq!(watchdog.state("g"), TitleState::Detected { at: t0 });

        // A second notification keeps the original timestamp.
        watchdog.note_rename("g", "Z", "X", t0 + Duration::from_secs(30));
        assert_eq!(
            watchdog.observe("g", Some("Z"), "X", t0 + DELAY),
            TitleDecision::Revert
        );
    }

    #[test]
    fn missing_title_counts_as_divergence() {
        let watchdog = TitleWatchdog::new(DELAY, 10);
        let now = Instant::now();
        assert_eq!(watchdog.observe("g", None, "X", now), TitleDecision::Detected);
    }

    #[test]
    fn batches_rotate_through_all_conversations() {
        let watchdog = TitleWatchdog::new(DELAY, 2);
        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| (*s).to_string()).collect();

        assert_eq!(watchdog.select_batch(&ids), vec!["a", "b"]);
        assert_eq!(watchdog.select_batch(&ids), vec!["c", "a"]);
        assert_eq!(watchdog.select_batch(&ids), vec!["b", "c"]);
    }

    fn title_locked(title: &str) -> Policy {
        Policy {
            gclock: true,
            group_name: Some(title.into()),
            ..Policy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn external_rename_is_reverted_on_the_next_tick() {
        let h = harness(fast_config(), vec![("g2", title_locked("Team X"))]);
        h.session.add_thread("g2", Some("Team X"), &[]);
        h.session.rename_externally("g2", "Team Y");

        h.enforcement.poll_titles().await;
        assert!(h.session.title_calls().is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        h.enforcement.poll_titles().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(h.session.title_calls(), vec!["Team X".to_string()]);
        assert_eq!(h.session.title_of("g2").as_deref(), Some("Team X"));
        assert_eq!(h.enforcement.watchdog().state("g2"), TitleState::Stable);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_revert_returns_to_stable_without_retry() {
        let h = harness(fast_config(), vec![("g2", title_locked("Team X"))]);
        h.session.add_thread("g2", Some("Team Y"), &[]);
        h.session.fail_titles(true);

        h.enforcement.poll_titles().await;
        tokio::time::sleep(DELAY).await;
        h.enforcement.poll_titles().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(h.session.title_calls().len(), 1);
        assert_eq!(h.enforcement.watchdog().state("g2"), TitleState::Stable);
    }
}
