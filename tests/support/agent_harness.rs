#![allow(dead_code)]

use grouplock::config::{Config, DelayBand};
use grouplock::enforcement::Enforcement;
use grouplock::session::SessionSlot;
use grouplock::store::{Policy, PolicyMap, PolicyStore};
use grouplock::testkit::FakeSession;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const OPERATOR: &str = "op";
pub const DEFAULT_NICK: &str = "LOCKED";

/// Config rooted in `tmp` with millisecond pacing and no liveness socket.
pub fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config {
        config_path: tmp.path().join("config.toml"),
        ..Config::default()
    };
    config.enforcement.operator_id = OPERATOR.into();
    config.enforcement.default_nickname = DEFAULT_NICK.into();
    config.enforcement.fast_band = DelayBand::new(100, 100);
    config.enforcement.slow_band = DelayBand::new(200, 200);
    config.enforcement.queue_pacing_ms = 10;
    config.gateway.enabled = false;
    config
}

pub fn write_credentials(config: &Config) {
    std::fs::write(
        config.credentials_path(),
        r#"[{"key": "c_user", "value": "self", "domain": "example.com"}]"#,
    )
    .unwrap();
}

pub fn write_policies(config: &Config, policies: &[(&str, Policy)]) {
    let map: PolicyMap = policies
        .iter()
        .map(|(id, policy)| ((*id).to_string(), policy.clone()))
        .collect();
    std::fs::write(
        config.policy_store_path(),
        serde_json::to_vec_pretty(&map).unwrap(),
    )
    .unwrap();
}

pub fn read_policies(config: &Config) -> PolicyMap {
    serde_json::from_slice(&std::fs::read(config.policy_store_path()).unwrap()).unwrap()
}

pub fn nick_locked(nick: &str) -> Policy {
    Policy {
        enabled: true,
        nick: Some(nick.into()),
        ..Policy::default()
    }
}

pub fn title_locked(title: &str) -> Policy {
    Policy {
        gclock: true,
        group_name: Some(title.into()),
        ..Policy::default()
    }
}

pub struct Harness {
    pub enforcement: Enforcement,
    pub session: Arc<FakeSession>,
    pub config: Config,
    _tmp: TempDir,
}

/// Enforcement wired to a logged-in [`FakeSession`].
pub fn harness(policies: &[(&str, Policy)], tweak: impl FnOnce(&mut Config)) -> Harness {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    tweak(&mut config);

    let map: PolicyMap = policies
        .iter()
        .map(|(id, policy)| ((*id).to_string(), policy.clone()))
        .collect();
    let store = Arc::new(PolicyStore::new(config.policy_store_path(), map));
    let session = Arc::new(FakeSession::new("self"));
    let slot = SessionSlot::new();
    slot.set(session.clone());

    Harness {
        enforcement: Enforcement::new(
            config.enforcement.clone(),
            store,
            slot,
            CancellationToken::new(),
        ),
        session,
        config,
        _tmp: tmp,
    }
}

pub async fn settle(enforcement: &Enforcement, conversation_id: &str) {
    while enforcement.queues().is_draining(conversation_id) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
