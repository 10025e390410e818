use super::agent_harness::{
    OPERATOR, nick_locked, read_policies, test_config, write_credentials, write_policies,
};
use grouplock::config::Config;
use grouplock::error::{CredentialError, StoreError};
use grouplock::platform::daemon::{DaemonStatus, run_with_connector, state_file_path};
use grouplock::testkit::{FakeConnector, FakeSession};
use grouplock::transport::SessionEvent;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Running {
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Running {
    async fn stop(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.handle.await.unwrap()
    }
}

fn start(config: Config, connector: Arc<FakeConnector>) -> Running {
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(run_with_connector(
        Arc::new(config),
        connector,
        shutdown.clone(),
    ));
    Running { shutdown, handle }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {what}");
}

fn configured() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    write_credentials(&config);
    (tmp, config)
}

#[tokio::test(start_paused = true)]
async fn failed_logins_back_off_linearly_until_one_succeeds() {
    let (_tmp, config) = configured();
    let session = Arc::new(FakeSession::new("self"));
    let connector = Arc::new(FakeConnector::new(session).failing_first(2));

    let started = Instant::now();
    let running = start(config, Arc::clone(&connector));
    wait_until("third login", || connector.logins() >= 3).await;

    // 5s after the first failure, 10s after the second.
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(connector.logins(), 3);
    running.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_abort_startup() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let connector = Arc::new(FakeConnector::new(Arc::new(FakeSession::new("self"))));

    let err = start(config, Arc::clone(&connector)).handle.await.unwrap().unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CredentialError>(),
        Some(CredentialError::Missing { .. })
    ));
    assert_eq!(connector.logins(), 0);
}

#[tokio::test(start_paused = true)]
async fn malformed_store_aborts_startup_without_overwriting_it() {
    let (_tmp, config) = configured();
    std::fs::write(config.policy_store_path(), "{ not json").unwrap();
    let connector = Arc::new(FakeConnector::new(Arc::new(FakeSession::new("self"))));

    let err = start(config.clone(), Arc::clone(&connector))
        .handle
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Parse { .. })
    ));
    assert_eq!(
        std::fs::read_to_string(config.policy_store_path()).unwrap(),
        "{ not json"
    );
    assert_eq!(connector.logins(), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_event_triggers_a_fresh_login() {
    let (_tmp, config) = configured();
    let session = Arc::new(FakeSession::new("self"));
    session.queue_event(SessionEvent::Disconnected {
        reason: "session expired".into(),
    });
    let connector = Arc::new(FakeConnector::new(session));

    let running = start(config, Arc::clone(&connector));
    wait_until("second login", || connector.logins() >= 2).await;

    running.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn operator_command_on_the_stream_is_enforced_and_persisted() {
    let (_tmp, config) = configured();
    let session = Arc::new(FakeSession::new("self"));
    session.add_thread(
        "g1",
        Some("Group"),
        &[(OPERATOR, None), ("m1", None), ("m2", Some("x"))],
    );
    session.queue_event(SessionEvent::Message {
        thread_id: "g1".into(),
        sender_id: OPERATOR.into(),
        body: "/nicklock on Z".into(),
    });
    let connector = Arc::new(FakeConnector::new(Arc::clone(&session)));

    let running = start(config.clone(), connector);
    wait_until("three renames", || session.nickname_calls("g1").len() >= 3).await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    running.stop().await.unwrap();

    let policies = read_policies(&config);
    let policy = &policies["g1"];
    assert!(policy.enabled);
    assert_eq!(policy.nick.as_deref(), Some("Z"));
    assert_eq!(policy.count, 2);

    let status = DaemonStatus::read(&state_file_path(&config)).unwrap();
    assert_eq!(status.nickname_locks, 1);
}

#[tokio::test(start_paused = true)]
async fn startup_resync_repairs_persisted_locks() {
    let (_tmp, config) = configured();
    write_policies(&config, &[("g1", nick_locked("Z"))]);
    let session = Arc::new(FakeSession::new("self"));
    session.add_thread("g1", None, &[("m1", Some("drifted"))]);
    let connector = Arc::new(FakeConnector::new(Arc::clone(&session)));

    let running = start(config.clone(), connector);
    wait_until("resync rename", || !session.nickname_calls("g1").is_empty()).await;
    running.stop().await.unwrap();

    assert_eq!(
        session.nickname_calls("g1"),
        vec![("m1".to_string(), "Z".to_string())]
    );
    assert!(read_policies(&config)["g1"].original.contains_key("m1"));
}

#[tokio::test(start_paused = true)]
async fn status_file_reports_the_active_session() {
    let (_tmp, config) = configured();
    let connector = Arc::new(FakeConnector::new(Arc::new(FakeSession::new("self"))));

    let running = start(config.clone(), Arc::clone(&connector));
    let path = state_file_path(&config);
    wait_until("status file", || {
        DaemonStatus::read(&path).is_ok_and(|status| status.session == "ACTIVE")
    })
    .await;

    running.stop().await.unwrap();
}
