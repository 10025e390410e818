use crate::transport::MessagingSession;
use std::sync::{Arc, PoisonError, RwLock};

/// Handle to whichever session is currently logged in. Queued corrections
/// outlive reconnects, so they resolve the session when they run instead of
/// capturing it when enqueued.
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<Option<Arc<dyn MessagingSession>>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session: Arc<dyn MessagingSession>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<Arc<dyn MessagingSession>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Like [`Self::current`] but an error while reconnecting.
    pub fn require(&self) -> anyhow::Result<Arc<dyn MessagingSession>> {
        self.current()
            .ok_or_else(|| anyhow::anyhow!("no active session (reconnecting)"))
    }
}
