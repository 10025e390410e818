//! In-memory [`MessagingSession`] for tests and dry runs.

use crate::error::TransportError;
use crate::session::{CookieRecord, Credentials};
use crate::transport::{MessagingSession, SessionConnector, SessionEvent, ThreadSnapshot};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outbound call observed by a [`FakeSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetTitle {
        thread_id: String,
        title: String,
    },
    SetNickname {
        thread_id: String,
        member_id: String,
        nickname: String,
    },
    Presence {
        thread_id: String,
    },
}

#[derive(Debug, Default)]
struct FakeState {
    threads: HashMap<String, ThreadSnapshot>,
    calls: Vec<Call>,
    failing_nicknames: VecDeque<String>,
    fail_titles: bool,
    disconnect_presence: bool,
    events: Vec<SessionEvent>,
}

pub struct FakeSession {
    user_id: String,
    latency: Duration,
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeSession {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            latency: Duration::from_millis(10),
            state: Mutex::new(FakeState::default()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a conversation. `members` are `(id, nickname)` pairs.
    pub fn add_thread(&self, thread_id: &str, title: Option<&str>, members: &[(&str, Option<&str>)]) {
        let mut nicknames = BTreeMap::new();
        for (id, nick) in members {
            if let Some(nick) = nick {
                nicknames.insert((*id).to_string(), (*nick).to_string());
            }
        }
        let snapshot = ThreadSnapshot {
            thread_id: thread_id.to_string(),
            title: title.map(str::to_string),
            participant_ids: members.iter().map(|(id, _)| (*id).to_string()).collect(),
            nicknames,
        };
        self.lock().threads.insert(thread_id.to_string(), snapshot);
    }

    /// Simulates someone else renaming the conversation.
    pub fn rename_externally(&self, thread_id: &str, title: &str) {
        if let Some(thread) = self.lock().threads.get_mut(thread_id) {
            thread.title = Some(title.to_string());
        }
    }

    /// Simulates someone else changing a nickname.
    pub fn change_nickname_externally(&self, thread_id: &str, member_id: &str, nickname: &str) {
        if let Some(thread) = self.lock().threads.get_mut(thread_id) {
            thread
                .nicknames
                .insert(member_id.to_string(), nickname.to_string());
        }
    }

    pub fn fail_next_nickname_for(&self, member_id: &str) {
        self.lock().failing_nicknames.push_back(member_id.to_string());
    }

    pub fn fail_titles(&self, fail: bool) {
        self.lock().fail_titles = fail;
    }

    pub fn disconnect_presence(&self, disconnect: bool) {
        self.lock().disconnect_presence = disconnect;
    }

    /// Events replayed by [`MessagingSession::listen`].
    pub fn queue_event(&self, event: SessionEvent) {
        self.lock().events.push(event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn title_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetTitle { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }

    pub fn nickname_calls(&self, thread_id: &str) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetNickname {
                    thread_id: t,
                    member_id,
                    nickname,
                } if t == thread_id => Some((member_id, nickname)),
                _ => None,
            })
            .collect()
    }

    pub fn title_of(&self, thread_id: &str) -> Option<String> {
        self.lock()
            .threads
            .get(thread_id)
            .and_then(|t| t.title.clone())
    }

    /// Highest number of mutation calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn mutation<F>(&self, apply: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut FakeState) -> anyhow::Result<()> + Send,
    {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let result = apply(&mut *self.lock());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MessagingSession for FakeSession {
    fn own_user_id(&self) -> &str {
        &self.user_id
    }

    fn thread_snapshot<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ThreadSnapshot>> + Send + 'a>> {
        Box::pin(async move {
            self.lock()
                .threads
                .get(thread_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown thread {thread_id}"))
        })
    }

    fn set_title<'a>(
        &'a self,
        thread_id: &'a str,
        title: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(self.mutation(move |state| {
            state.calls.push(Call::SetTitle {
                thread_id: thread_id.to_string(),
                title: title.to_string(),
            });
            if state.fail_titles {
                anyhow::bail!(TransportError::Request {
                    operation: "set_title".into(),
                    message: "rejected".into(),
                });
            }
            if let Some(thread) = state.threads.get_mut(thread_id) {
                thread.title = Some(title.to_string());
            }
            Ok(())
        }))
    }

    fn set_nickname<'a>(
        &'a self,
        thread_id: &'a str,
        member_id: &'a str,
        nickname: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(self.mutation(move |state| {
            state.calls.push(Call::SetNickname {
                thread_id: thread_id.to_string(),
                member_id: member_id.to_string(),
                nickname: nickname.to_string(),
            });
            if let Some(pos) = state.failing_nicknames.iter().position(|m| m == member_id) {
                state.failing_nicknames.remove(pos);
                anyhow::bail!(TransportError::Request {
                    operation: "set_nickname".into(),
                    message: "rejected".into(),
                });
            }
            if let Some(thread) = state.threads.get_mut(thread_id) {
                thread
                    .nicknames
                    .insert(member_id.to_string(), nickname.to_string());
            }
            Ok(())
        }))
    }

    fn send_presence<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call::Presence {
                thread_id: thread_id.to_string(),
            });
            if state.disconnect_presence {
                anyhow::bail!(TransportError::Disconnected("presence rejected".into()));
            }
            Ok(())
        })
    }

    fn export_credentials<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Credentials>> + Send + 'a>> {
        Box::pin(async move {
            Ok(Credentials::new(vec![CookieRecord {
                key: "c_user".into(),
                value: self.user_id.clone(),
                extra: serde_json::Map::new(),
            }]))
        })
    }

    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<SessionEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let events = std::mem::take(&mut self.lock().events);
            for event in events {
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
            // Stay connected until the receiver goes away.
            tx.closed().await;
            Ok(())
        })
    }
}

/// Connector handing out a shared [`FakeSession`], optionally failing the
/// first few logins.
pub struct FakeConnector {
    session: Arc<FakeSession>,
    failures_left: AtomicUsize,
    logins: AtomicUsize,
}

impl FakeConnector {
    pub fn new(session: Arc<FakeSession>) -> Self {
        Self {
            session,
            failures_left: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing_first(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    /// Login attempts seen so far, successful or not.
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

impl SessionConnector for FakeConnector {
    fn name(&self) -> &str {
        "fake"
    }

    fn login<'a>(
        &'a self,
        _credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Arc<dyn MessagingSession>>> + Send + 'a>>
    {
        Box::pin(async move {
            self.logins.fetch_add(1, Ordering::SeqCst);
            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failed {
                anyhow::bail!(TransportError::Login("fake login refused".into()));
            }
            let session: Arc<dyn MessagingSession> = self.session.clone();
            Ok(session)
        })
    }
}
