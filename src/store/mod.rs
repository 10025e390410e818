//! Durable mapping from conversation id to enforcement [`Policy`].
//!
//! Every read-modify-write happens under one mutex so counter and cooldown
//! updates from the reactor, the watchdog and the sweep never interleave.
//! Saves snapshot the map, then write it with a temp-file rename.

mod persistence;
mod policy;

pub use persistence::write_atomic;
pub use policy::{CorrectionOutcome, Policy};

use crate::error::StoreError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub type PolicyMap = BTreeMap<String, Policy>;

#[derive(Debug)]
pub struct PolicyStore {
    path: PathBuf,
    policies: Mutex<PolicyMap>,
    save_lock: tokio::sync::Mutex<()>,
}

impl PolicyStore {
    /// In-memory store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>, policies: PolicyMap) -> Self {
        Self {
            path: path.into(),
            policies: Mutex::new(policies),
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Loads the store at `path`. A missing file yields an empty store; a
    /// present but malformed file is an error so it is never clobbered.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let policies = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => PolicyMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PolicyMap::new(),
            Err(e) => {
                return Err(StoreError::Read {
                    path,
                    message: e.to_string(),
                });
            }
        };
        tracing::info!(path = %path.display(), policies = policies.len(), "policy store loaded");
        Ok(Self::new(path, policies))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, PolicyMap> {
        self.policies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, conversation_id: &str) -> Option<Policy> {
        self.lock().get(conversation_id).cloned()
    }

    pub fn snapshot(&self) -> PolicyMap {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Mutates an existing policy; `None` when the conversation has none.
    pub fn update<R>(&self, conversation_id: &str, f: impl FnOnce(&mut Policy) -> R) -> Option<R> {
        self.lock().get_mut(conversation_id).map(f)
    }

    /// Mutates the policy for `conversation_id`, creating an empty one first.
    pub fn upsert<R>(&self, conversation_id: &str, f: impl FnOnce(&mut Policy) -> R) -> R {
        let mut policies = self.lock();
        let policy = policies.entry(conversation_id.to_string()).or_default();
        f(policy)
    }

    /// Conversations with nickname enforcement active.
    pub fn nickname_locked(&self) -> Vec<String> {
        self.ids_where(|p| p.enabled)
    }

    /// Conversations with title enforcement active and a title recorded.
    pub fn title_locked(&self) -> Vec<String> {
        self.ids_where(|p| p.locked_title().is_some())
    }

    /// Conversations with any enforcement active.
    pub fn enforced(&self) -> Vec<String> {
        self.ids_where(|p| !p.is_inert())
    }

    fn ids_where(&self, predicate: impl Fn(&Policy) -> bool) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, policy)| predicate(policy))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Counts one successful nickname correction and trips the cooldown once
    /// `limit` is reached.
    pub fn record_correction(&self, conversation_id: &str, limit: u32) -> Option<CorrectionOutcome> {
        self.update(conversation_id, |policy| {
            policy.count = policy.count.saturating_add(1);
            let entered_cooldown = !policy.cooldown && policy.count >= limit;
            if entered_cooldown {
                policy.cooldown = true;
            }
            CorrectionOutcome {
                count: policy.count,
                entered_cooldown,
            }
        })
    }

    /// Clears the cooldown flag and resets the counter.
    pub fn end_cooldown(&self, conversation_id: &str) -> bool {
        self.update(conversation_id, |policy| {
            policy.cooldown = false;
            policy.count = 0;
        })
        .is_some()
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.snapshot();
        let data = serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(&self.path, &data).await
    }

    /// Saves and logs instead of failing; in-memory state stays authoritative.
    pub async fn persist(&self) {
        if let Err(error) = self.save().await {
            tracing::warn!(%error, "policy store save failed; keeping in-memory state");
        }
    }
}
