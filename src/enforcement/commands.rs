use super::Enforcement;
use super::sync::members_except;
use crate::commands::Command;
use anyhow::Context;

impl Enforcement {
    /// Runs an operator command in `conversation_id`. Nothing is ever sent
    /// back into the conversation; failures only reach the log.
    pub async fn execute_command(&self, conversation_id: &str, command: Command) -> anyhow::Result<()> {
        tracing::info!(conversation_id, command = command.name(), "operator command");
        match command {
            Command::NickLockOn { nickname } => self.nicklock_on(conversation_id, nickname).await,
            Command::NickLockOff => {
                self.nicklock_off(conversation_id).await;
                Ok(())
            }
            Command::NickAll => self.nick_all(conversation_id).await,
            Command::GroupLock { title } => self.group_lock(conversation_id, title).await,
            Command::UnlockGroupName => {
                self.unlock_group_name(conversation_id).await;
                Ok(())
            }
        }
    }

    async fn nicklock_on(&self, conversation_id: &str, nickname: Option<String>) -> anyhow::Result<()> {
        let session = self.slot.require()?;
        let snapshot = session
            .thread_snapshot(conversation_id)
            .await
            .context("fetch conversation for /nicklock on")?;
        let operator = self.operator_id(session.as_ref());
        let default_nickname = self.config.default_nickname.clone();

        let (nick, accepts) = self.store.upsert(conversation_id, |policy| {
            policy.enabled = true;
            let nick = nickname
                .or_else(|| policy.nick.clone())
                .unwrap_or(default_nickname);
            policy.nick = Some(nick.clone());
            policy.original = members_except(&snapshot, &operator)
                .into_iter()
                .map(|member_id| (member_id.to_string(), nick.clone()))
                .collect();
            (nick, policy.accepts_nickname_corrections())
        });
        self.store.persist().await;
        tracing::info!(conversation_id, nick = %nick, "nickname lock enabled");

        if accepts {
            self.enqueue_everyone(conversation_id, &snapshot, &operator);
        } else {
            tracing::info!(conversation_id, "in cooldown; corrections start after it ends");
        }
        Ok(())
    }

    async fn nicklock_off(&self, conversation_id: &str) {
        if self
            .store
            .update(conversation_id, |policy| policy.enabled = false)
            .is_some()
        {
            self.store.persist().await;
            tracing::info!(conversation_id, "nickname lock disabled");
        }
    }

    async fn nick_all(&self, conversation_id: &str) -> anyhow::Result<()> {
        let Some(policy) = self.store.get(conversation_id) else {
            tracing::info!(conversation_id, "/nickall ignored; no policy for this conversation");
            return Ok(());
        };
        if !policy.accepts_nickname_corrections() {
            tracing::info!(conversation_id, "/nickall ignored; lock off or cooling down");
            return Ok(());
        }

        let session = self.slot.require()?;
        let snapshot = session
            .thread_snapshot(conversation_id)
            .await
            .context("fetch conversation for /nickall")?;
        let operator = self.operator_id(session.as_ref());
        let nick = policy.effective_nick(&self.config.default_nickname).to_string();

        self.store.update(conversation_id, |policy| {
            policy.original = members_except(&snapshot, &operator)
                .into_iter()
                .map(|member_id| (member_id.to_string(), nick.clone()))
                .collect();
        });
        self.store.persist().await;

        self.enqueue_everyone(conversation_id, &snapshot, &operator);
        Ok(())
    }

    /// Operator first, then every other member in snapshot order.
    fn enqueue_everyone(
        &self,
        conversation_id: &str,
        snapshot: &crate::transport::ThreadSnapshot,
        operator: &str,
    ) {
        if snapshot.participant_ids.iter().any(|id| id == operator) {
            self.enqueue_operator_activation(conversation_id, operator);
        }
        for member_id in members_except(snapshot, operator) {
            self.enqueue_nickname(conversation_id, member_id);
        }
    }

    async fn group_lock(&self, conversation_id: &str, title: Option<String>) -> anyhow::Result<()> {
        let Some(title) = title else {
            return self.capture_title(conversation_id).await;
        };

        self.store.upsert(conversation_id, |policy| {
            policy.gclock = true;
            policy.group_name = Some(title.clone());
        });
        self.store.persist().await;
        self.watchdog.reset(conversation_id);
        tracing::info!(conversation_id, title = %title, "title lock enabled");

        self.apply_title(conversation_id, &title).await
    }

    async fn capture_title(&self, conversation_id: &str) -> anyhow::Result<()> {
        let session = self.slot.require()?;
        let snapshot = session
            .thread_snapshot(conversation_id)
            .await
            .context("fetch conversation for /gclock")?;
        let Some(title) = snapshot.title.filter(|title| !title.is_empty()) else {
            tracing::warn!(conversation_id, "/gclock ignored; conversation has no title to capture");
            return Ok(());
        };

        self.store.upsert(conversation_id, |policy| {
            policy.gclock = true;
            policy.group_name = Some(title.clone());
        });
        self.store.persist().await;
        self.watchdog.reset(conversation_id);
        tracing::info!(conversation_id, title = %title, "title lock enabled on current title");
        Ok(())
    }

    async fn unlock_group_name(&self, conversation_id: &str) {
        if self
            .store
            .update(conversation_id, |policy| policy.gclock = false)
            .is_some()
        {
            self.store.persist().await;
            tracing::info!(conversation_id, "title lock disabled");
        }
        self.watchdog.reset(conversation_id);
    }
}
