use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the messaging bridge (REST + `/events` websocket).
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Cookie records used to log in. Relative paths resolve against the
    /// config directory.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    /// Where periodic credential backups are written.
    #[serde(default = "default_credentials_backup_path")]
    pub credentials_backup_path: String,
    #[serde(default = "default_policy_store_path")]
    pub policy_store_path: String,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_backup_interval_secs")]
    pub credentials_backup_interval_secs: u64,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    /// Login backoff grows by this much per failed attempt.
    #[serde(default = "default_login_backoff_step_secs")]
    pub login_backoff_step_secs: u64,
    #[serde(default = "default_login_backoff_max_secs")]
    pub login_backoff_max_secs: u64,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:7310".into()
}

fn default_credentials_path() -> String {
    "appstate.json".into()
}

fn default_credentials_backup_path() -> String {
    "appstate.backup.json".into()
}

fn default_policy_store_path() -> String {
    "groupData.json".into()
}

fn default_heartbeat_interval_secs() -> u64 {
    300
}

fn default_backup_interval_secs() -> u64 {
    600
}

fn default_resync_interval_secs() -> u64 {
    300
}

fn default_login_backoff_step_secs() -> u64 {
    5
}

fn default_login_backoff_max_secs() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            credentials_path: default_credentials_path(),
            credentials_backup_path: default_credentials_backup_path(),
            policy_store_path: default_policy_store_path(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            credentials_backup_interval_secs: default_backup_interval_secs(),
            resync_interval_secs: default_resync_interval_secs(),
            login_backoff_step_secs: default_login_backoff_step_secs(),
            login_backoff_max_secs: default_login_backoff_max_secs(),
        }
    }
}
