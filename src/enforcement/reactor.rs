use super::Enforcement;

impl Enforcement {
    /// Reacts to a nickname change seen on the event stream. Returns whether
    /// a correction was queued.
    pub fn on_nickname_change(&self, conversation_id: &str, member_id: &str, nickname: &str) -> bool {
        let Some(policy) = self.store.get(conversation_id) else {
            return false;
        };
        if !policy.accepts_nickname_corrections() {
            return false;
        }

        let desired = policy.desired_nickname(member_id, &self.config.default_nickname);
        if nickname == desired {
            return false;
        }

        tracing::info!(
            conversation_id,
            member_id,
            observed = nickname,
            desired,
            "nickname drift detected"
        );
        self.enqueue_nickname(conversation_id, member_id);
        true
    }

    /// Captures newcomers with the policy nickname and queues their first
    /// correction.
    pub async fn on_members_joined(&self, conversation_id: &str, member_ids: &[String]) {
        let Some(session) = self.slot.current() else {
            return;
        };
        let operator = self.operator_id(session.as_ref());
        let default_nickname = self.config.default_nickname.clone();

        let joined = self.store.update(conversation_id, |policy| {
            if !policy.enabled {
                return None;
            }
            let nick = policy.effective_nick(&default_nickname).to_string();
            let mut added = Vec::new();
            for member_id in member_ids {
                if *member_id == operator {
                    continue;
                }
                if !policy.original.contains_key(member_id) {
                    policy.original.insert(member_id.clone(), nick.clone());
                }
                added.push(member_id.clone());
            }
            Some((added, policy.accepts_nickname_corrections()))
        });
        let Some(Some((added, accepts))) = joined else {
            return;
        };
        if added.is_empty() {
            return;
        }

        self.store.persist().await;
        if accepts {
            for member_id in &added {
                tracing::info!(conversation_id, member_id = %member_id, "member joined; applying nickname");
                self.enqueue_nickname(conversation_id, member_id);
            }
        }
    }

    /// Drops a departed member's snapshot entry.
    pub async fn on_member_left(&self, conversation_id: &str, member_id: &str) {
        let removed = self
            .store
            .update(conversation_id, |policy| policy.original.remove(member_id).is_some())
            .unwrap_or(false);
        if removed {
            tracing::info!(conversation_id, member_id, "member left; snapshot entry removed");
            self.store.persist().await;
        }
    }
}
