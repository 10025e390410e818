use super::backup::run_backup_worker;
use super::heartbeat_worker::run_heartbeat_worker;
use crate::config::Config;
use crate::enforcement::{Enforcement, Flow};
use crate::error::LockError;
use crate::session::{Credentials, SessionState, SessionStatus, login_backoff};
use crate::transport::{MessagingSession, SessionConnector, SessionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How one session worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    Stopped,
    Reconnect(String),
}

enum ActiveExit {
    Shutdown,
    Reconnect(String),
}

/// Login, run, reconnect. Never gives up on the transport; only unusable
/// credential state ends it with an error.
pub struct SessionLifecycle {
    config: Arc<Config>,
    connector: Arc<dyn SessionConnector>,
    enforcement: Enforcement,
    status: SessionStatus,
    shutdown: CancellationToken,
}

impl SessionLifecycle {
    pub fn new(
        config: Arc<Config>,
        connector: Arc<dyn SessionConnector>,
        enforcement: Enforcement,
        status: SessionStatus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            connector,
            enforcement,
            status,
            shutdown,
        }
    }

    pub async fn run(&self) -> Result<(), LockError> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }
            let credentials = Credentials::load(&self.config.credentials_path())?;

            self.status.transition(SessionState::LoggingIn);
            let Some(session) = self.login(&credentials).await else {
                self.status.transition(SessionState::LoggedOut);
                return Ok(());
            };
            tracing::info!(
                connector = self.connector.name(),
                user_id = session.own_user_id(),
                "session active"
            );
            self.status.transition(SessionState::Active);

            let exit = self.run_active(session).await;
            self.enforcement.slot().clear();
            match exit {
                ActiveExit::Shutdown => {
                    self.status.transition(SessionState::LoggedOut);
                    return Ok(());
                }
                ActiveExit::Reconnect(reason) => {
                    tracing::warn!("session lost ({reason}); reconnecting");
                    self.status.transition(SessionState::Reconnecting);
                    let pause = Duration::from_secs(self.config.session.login_backoff_step_secs);
                    tokio::select! {
                        () = self.shutdown.cancelled() => {}
                        () = tokio::time::sleep(pause) => {}
                    }
                }
            }
        }
    }

    /// Retries with `min(max, attempts * step)` backoff until a login
    /// succeeds. `None` means shutdown arrived first.
    async fn login(&self, credentials: &Credentials) -> Option<Arc<dyn MessagingSession>> {
        let session = &self.config.session;
        let mut attempts: u32 = 0;
        loop {
            let result = tokio::select! {
                () = self.shutdown.cancelled() => return None,
                result = self.connector.login(credentials) => result,
            };
            match result {
                Ok(session) => return Some(session),
                Err(error) => {
                    attempts = attempts.saturating_add(1);
                    let backoff = login_backoff(
                        attempts,
                        session.login_backoff_step_secs,
                        session.login_backoff_max_secs,
                    );
                    tracing::warn!(
                        attempts,
                        backoff_secs = backoff.as_secs(),
                        "login failed: {error:#}"
                    );
                    tokio::select! {
                        () = self.shutdown.cancelled() => return None,
                        () = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    async fn run_active(&self, session: Arc<dyn MessagingSession>) -> ActiveExit {
        self.enforcement.slot().set(Arc::clone(&session));
        let stop = self.shutdown.child_token();
        let (tx, mut rx) = mpsc::channel::<SessionEvent>(EVENT_CHANNEL_CAPACITY);
        let mut workers = self.spawn_workers(&session, tx, &stop);

        let exit = loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break ActiveExit::Shutdown,
                event = rx.recv() => {
                    let Some(event) = event else {
                        break ActiveExit::Reconnect("event stream ended".into());
                    };
                    if let Flow::Reconnect { reason } = self.enforcement.dispatch(event).await {
                        break ActiveExit::Reconnect(reason);
                    }
                }
                Some(joined) = workers.join_next() => match joined {
                    Ok(WorkerExit::Stopped) => {}
                    Ok(WorkerExit::Reconnect(reason)) => break ActiveExit::Reconnect(reason),
                    Err(error) if error.is_panic() => {
                        tracing::error!("session worker panicked");
                        break ActiveExit::Reconnect("worker panicked".into());
                    }
                    Err(error) => tracing::debug!("session worker cancelled: {error}"),
                },
            }
        };

        stop.cancel();
        workers.shutdown().await;
        exit
    }

    fn spawn_workers(
        &self,
        session: &Arc<dyn MessagingSession>,
        tx: mpsc::Sender<SessionEvent>,
        stop: &CancellationToken,
    ) -> JoinSet<WorkerExit> {
        let mut workers = JoinSet::new();

        let listener = Arc::clone(session);
        workers.spawn(async move {
            match listener.listen(tx).await {
                Ok(()) => WorkerExit::Reconnect("event stream ended".into()),
                Err(error) => WorkerExit::Reconnect(format!("event stream: {error:#}")),
            }
        });

        let enforcement = self.enforcement.clone();
        let period = self.config.title_poll_interval();
        let token = stop.clone();
        workers.spawn(async move {
            run_ticker(period, token, || {
                let enforcement = enforcement.clone();
                async move { enforcement.poll_titles().await }
            })
            .await
        });

        let enforcement = self.enforcement.clone();
        let period = self.config.resync_interval();
        let token = stop.clone();
        workers.spawn(async move {
            run_ticker(period, token, || {
                let enforcement = enforcement.clone();
                async move { enforcement.resync().await }
            })
            .await
        });

        workers.spawn(run_heartbeat_worker(
            Arc::clone(session),
            Arc::clone(self.enforcement.store()),
            self.config.heartbeat_interval(),
            stop.clone(),
        ));

        workers.spawn(run_backup_worker(
            Arc::clone(session),
            self.config.credentials_backup_path(),
            self.config.credentials_backup_interval(),
            stop.clone(),
        ));

        workers
    }
}

/// Runs `tick` immediately and then every `period` until `stop` fires.
async fn run_ticker<F, Fut>(period: Duration, stop: CancellationToken, mut tick: F) -> WorkerExit
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = stop.cancelled() => return WorkerExit::Stopped,
            _ = interval.tick() => {}
        }
        tokio::select! {
            () = stop.cancelled() => return WorkerExit::Stopped,
            () = tick() => {}
        }
    }
}
