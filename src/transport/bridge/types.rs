use crate::transport::{SessionEvent, ThreadSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EVENTS_PATH: &str = "/events";
pub const SESSION_HEADER: &str = "X-Session-Token";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub app_state: &'a crate::session::Credentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: String,
    pub session_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    pub thread_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub nicknames: BTreeMap<String, String>,
}

impl From<ThreadInfo> for ThreadSnapshot {
    fn from(info: ThreadInfo) -> Self {
        Self {
            thread_id: info.thread_id,
            title: info.name,
            participant_ids: info.participant_ids,
            nicknames: info.nicknames,
        }
    }
}

/// Frame pushed over the `/events` websocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    #[serde(rename_all = "camelCase")]
    Message {
        thread_id: String,
        sender_id: String,
        #[serde(default)]
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    Nickname {
        thread_id: String,
        participant_id: String,
        #[serde(default)]
        nickname: String,
        #[serde(default)]
        author_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Title {
        thread_id: String,
        title: String,
        #[serde(default)]
        author_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MembersAdded {
        thread_id: String,
        participant_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    MemberRemoved {
        thread_id: String,
        participant_id: String,
    },
    Disconnect {
        #[serde(default)]
        reason: String,
    },
    #[serde(other)]
    Unknown,
}

impl BridgeEvent {
    pub fn into_session_event(self) -> Option<SessionEvent> {
        Some(match self {
            Self::Message {
                thread_id,
                sender_id,
                body,
            } => SessionEvent::Message {
                thread_id,
                sender_id,
                body,
            },
            Self::Nickname {
                thread_id,
                participant_id,
                nickname,
                author_id,
            } => SessionEvent::NicknameChanged {
                thread_id,
                member_id: participant_id,
                nickname,
                author_id,
            },
            Self::Title {
                thread_id,
                title,
                author_id,
            } => SessionEvent::TitleChanged {
                thread_id,
                title,
                author_id,
            },
            Self::MembersAdded {
                thread_id,
                participant_ids,
            } => SessionEvent::MembersJoined {
                thread_id,
                member_ids: participant_ids,
            },
            Self::MemberRemoved {
                thread_id,
                participant_id,
            } => SessionEvent::MemberLeft {
                thread_id,
                member_id: participant_id,
            },
            Self::Disconnect { reason } => SessionEvent::Disconnected { reason },
            Self::Unknown => return None,
        })
    }
}
