use crate::session::Credentials;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Point-in-time view of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub thread_id: String,
    pub title: Option<String>,
    pub participant_ids: Vec<String>,
    /// Member id → current nickname. Members without a nickname are absent.
    pub nicknames: BTreeMap<String, String>,
}

impl ThreadSnapshot {
    pub fn nickname_of(&self, member_id: &str) -> Option<&str> {
        self.nicknames.get(member_id).map(String::as_str)
    }
}

/// Real-time notification delivered by [`MessagingSession::listen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Message {
        thread_id: String,
        sender_id: String,
        body: String,
    },
    NicknameChanged {
        thread_id: String,
        member_id: String,
        nickname: String,
        author_id: Option<String>,
    },
    TitleChanged {
        thread_id: String,
        title: String,
        author_id: Option<String>,
    },
    MembersJoined {
        thread_id: String,
        member_ids: Vec<String>,
    },
    MemberLeft {
        thread_id: String,
        member_id: String,
    },
    /// Remote side asked for a fresh login.
    Disconnected { reason: String },
}

/// Logged-in messaging account. Every call suspends until the remote side
/// answers.
pub trait MessagingSession: Send + Sync {
    /// Identity of the logged-in account.
    fn own_user_id(&self) -> &str;

    fn thread_snapshot<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ThreadSnapshot>> + Send + 'a>>;

    fn set_title<'a>(
        &'a self,
        thread_id: &'a str,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    fn set_nickname<'a>(
        &'a self,
        thread_id: &'a str,
        member_id: &'a str,
        nickname: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    /// Idle-prevention liveness signal (typing indicator or equivalent).
    fn send_presence<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    /// Current cookie records, for backup.
    fn export_credentials<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Credentials>> + Send + 'a>>;

    /// Streams events into `tx` until the connection drops (long-running).
    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<SessionEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Turns credential state into a live session.
pub trait SessionConnector: Send + Sync {
    fn name(&self) -> &str;

    fn login<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Arc<dyn MessagingSession>>> + Send + 'a>>;
}
