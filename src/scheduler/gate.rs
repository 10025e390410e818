use anyhow::Context;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// System-wide counting gate in front of every outbound mutation call.
///
/// Admission is FIFO: a released slot goes to the longest-waiting caller.
/// There is no timeout; a holder that never drops its permit starves
/// everyone else.
#[derive(Debug, Clone)]
pub struct GlobalGate {
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    capacity: usize,
}

/// Held slot; dropping it releases the slot to the next waiter.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GlobalGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            active: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> anyhow::Result<GatePermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("global gate closed")?;
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(GatePermit {
            _permit: permit,
            active: Arc::clone(&self.active),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of holders.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
