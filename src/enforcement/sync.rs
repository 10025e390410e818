use super::Enforcement;
use crate::transport::{MessagingSession, ThreadSnapshot};

impl Enforcement {
    /// Re-synchronization sweep: reapply nicknames for every active lock,
    /// whether or not a change event was seen. Conversations with corrections
    /// still queued are left for the next sweep.
    pub async fn resync(&self) {
        let Some(session) = self.slot.current() else {
            return;
        };
        let operator = self.operator_id(session.as_ref());
        for conversation_id in self.store.nickname_locked() {
            if self.queues.is_draining(&conversation_id) {
                tracing::debug!(conversation_id = %conversation_id, "resync skipped; corrections still queued");
                continue;
            }
            let queued = self
                .resync_conversation(session.as_ref(), &conversation_id, &operator)
                .await;
            if queued > 0 {
                tracing::info!(conversation_id = %conversation_id, queued, "resync queued nickname corrections");
            }
        }
    }

    async fn resync_conversation(
        &self,
        session: &dyn MessagingSession,
        conversation_id: &str,
        operator: &str,
    ) -> usize {
        if !self
            .store
            .get(conversation_id)
            .is_some_and(|policy| policy.accepts_nickname_corrections())
        {
            return 0;
        }
        let snapshot = match session.thread_snapshot(conversation_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(conversation_id, "resync skipped: {error:#}");
                return 0;
            }
        };

        let default_nickname = &self.config.default_nickname;
        let members = members_except(&snapshot, operator);
        let Some((changed, policy)) = self.store.update(conversation_id, |policy| {
            let before = policy.original.len();
            let added = policy.sync_membership(members.iter().copied(), default_nickname);
            let changed = !added.is_empty() || policy.original.len() != before + added.len();
            (changed, policy.clone())
        }) else {
            return 0;
        };
        if changed {
            self.store.persist().await;
        }
        if !policy.accepts_nickname_corrections() {
            return 0;
        }

        let mut fixes = Vec::new();
        if snapshot.participant_ids.iter().any(|id| id == operator) {
            let desired = policy.effective_nick(default_nickname);
            if snapshot.nickname_of(operator) != Some(desired) {
                fixes.push(operator.to_string());
            }
        }
        for member_id in members {
            let desired = policy.desired_nickname(member_id, default_nickname);
            if snapshot.nickname_of(member_id) != Some(desired) {
                fixes.push(member_id.to_string());
            }
        }

        for member_id in &fixes {
            self.enqueue_nickname(conversation_id, member_id);
        }
        fixes.len()
    }
}

/// Participant ids other than `operator`, in snapshot order.
pub(super) fn members_except<'s>(snapshot: &'s ThreadSnapshot, operator: &str) -> Vec<&'s str> {
    snapshot
        .participant_ids
        .iter()
        .map(String::as_str)
        .filter(|id| *id != operator)
        .collect()
}
