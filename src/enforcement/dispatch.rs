use super::Enforcement;
use crate::commands::parse_command;
use crate::transport::SessionEvent;
use tokio::time::Instant;

/// What the event loop should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The session is gone; log in again.
    Reconnect { reason: String },
}

impl Enforcement {
    /// Routes one event from the session stream. Command execution is
    /// spawned so a slow fetch never stalls the stream.
    pub async fn dispatch(&self, event: SessionEvent) -> Flow {
        match event {
            SessionEvent::Message {
                thread_id,
                sender_id,
                body,
            } => self.on_message(thread_id, &sender_id, &body),
            SessionEvent::NicknameChanged {
                thread_id,
                member_id,
                nickname,
                ..
            } => {
                self.on_nickname_change(&thread_id, &member_id, &nickname);
            }
            SessionEvent::TitleChanged {
                thread_id, title, ..
            } => {
                if let Some(desired) = self
                    .store
                    .get(&thread_id)
                    .and_then(|policy| policy.locked_title().map(str::to_string))
                {
                    self.watchdog
                        .note_rename(&thread_id, &title, &desired, Instant::now());
                }
            }
            SessionEvent::MembersJoined {
                thread_id,
                member_ids,
            } => self.on_members_joined(&thread_id, &member_ids).await,
            SessionEvent::MemberLeft {
                thread_id,
                member_id,
            } => self.on_member_left(&thread_id, &member_id).await,
            SessionEvent::Disconnected { reason } => return Flow::Reconnect { reason },
        }
        Flow::Continue
    }

    fn on_message(&self, conversation_id: String, sender_id: &str, body: &str) {
        let Some(command) = parse_command(body) else {
            return;
        };
        let Some(session) = self.slot.current() else {
            return;
        };
        if sender_id != self.operator_id(session.as_ref()) {
            tracing::debug!(
                conversation_id = %conversation_id,
                sender_id,
                command = command.name(),
                "ignoring command from non-operator"
            );
            return;
        }

        let enforcement = self.clone();
        tokio::spawn(async move {
            let name = command.name();
            if let Err(error) = enforcement.execute_command(&conversation_id, command).await {
                tracing::warn!(conversation_id = %conversation_id, command = name, "command failed: {error:#}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::TitleState;
    use crate::enforcement::test_support::{OPERATOR, fast_config, harness, settle};
    use crate::store::Policy;
    use std::time::Duration;

    fn message(sender: &str, body: &str) -> SessionEvent {
        SessionEvent::Message {
            thread_id: "g1".into(),
            sender_id: sender.into(),
            body: body.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn operator_command_is_executed() {
        let h = harness(fast_config(), vec![]);
        h.session.add_thread("g1", None, &[("m1", None)]);

        let flow = h.enforcement.dispatch(message(OPERATOR, "/NICKLOCK on")).await;
        assert_eq!(flow, Flow::Continue);
        tokio::time::sleep(Duration::from_millis(50)).await;
        settle(&h.enforcement, "g1").await;

        assert!(h.enforcement.store().get("g1").unwrap().enabled);
        assert_eq!(h.session.nickname_calls("g1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_from_others_are_ignored() {
        let h = harness(fast_config(), vec![]);
        h.session.add_thread("g1", None, &[("m1", None)]);

        h.enforcement.dispatch(message("m1", "/nicklock on")).await;
        h.enforcement.dispatch(message(OPERATOR, "just chatting")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(h.enforcement.store().get("g1").is_none());
    }

    #[tokio::test]
    async fn title_event_starts_the_grace_window() {
        let policy = Policy {
            gclock: true,
            group_name: Some("Team X".into()),
            ..Policy::default()
        };
        let h = harness(fast_config(), vec![("g1", policy)]);

        h.enforcement
            .dispatch(SessionEvent::TitleChanged {
                thread_id: "g1".into(),
                title: "Team Y".into(),
                author_id: Some("m1".into()),
            })
            .await;

        assert!(matches!(
            h.enforcement.watchdog().state("g1"),
            TitleState::Detected { .. }
        ));
        assert!(h.session.title_calls().is_empty());
    }

    #[tokio::test]
    async fn disconnect_requests_reconnect() {
        let h = harness(fast_config(), vec![]);
        let flow = h
            .enforcement
            .dispatch(SessionEvent::Disconnected {
                reason: "logged out".into(),
            })
            .await;
        assert_eq!(
            flow,
            Flow::Reconnect {
                reason: "logged out".into()
            }
        );
    }
}
