use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Where the session lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    Active,
    Reconnecting,
}

/// Shared view of the lifecycle for the liveness endpoint and logs.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    inner: Arc<RwLock<StatusSnapshot>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub since: DateTime<Utc>,
    pub reconnects: u32,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                state: SessionState::LoggedOut,
                since: Utc::now(),
                reconnects: 0,
            })),
        }
    }
}

impl SessionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition(&self, state: SessionState) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.state == state {
            return;
        }
        if state == SessionState::Reconnecting {
            inner.reconnects = inner.reconnects.saturating_add(1);
        }
        tracing::debug!(from = %inner.state, to = %state, "session state");
        inner.state = state;
        inner.since = Utc::now();
    }

    pub fn state(&self) -> SessionState {
        self.snapshot().state
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// `min(max, attempts * step)`; attempts start at 1 for the first failure.
pub fn login_backoff(attempts: u32, step_secs: u64, max_secs: u64) -> Duration {
    let secs = u64::from(attempts).saturating_mul(step_secs).min(max_secs);
    Duration::from_secs(secs.max(1))
}
