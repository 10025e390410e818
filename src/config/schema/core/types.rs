use super::super::{EnforcementConfig, GatewayConfig, ObservabilityConfig, SessionConfig};
use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub enforcement: EnforcementConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

pub(super) fn default_config_dir() -> PathBuf {
    let home = UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
    home.join(".grouplock")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: default_config_dir().join("config.toml"),
            enforcement: EnforcementConfig::default(),
            session: SessionConfig::default(),
            gateway: GatewayConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Directory holding config.toml; relative data paths resolve against it.
    pub fn base_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    /// Expands `~` and anchors relative paths at [`Self::base_dir`].
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(raw).as_ref());
        if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir().join(expanded)
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.resolve_path(&self.session.credentials_path)
    }

    pub fn credentials_backup_path(&self) -> PathBuf {
        self.resolve_path(&self.session.credentials_backup_path)
    }

    pub fn policy_store_path(&self) -> PathBuf {
        self.resolve_path(&self.session.policy_store_path)
    }

    pub fn title_poll_interval(&self) -> Duration {
        Duration::from_secs(self.enforcement.title_poll_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.session.heartbeat_interval_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.session.resync_interval_secs)
    }

    pub fn credentials_backup_interval(&self) -> Duration {
        Duration::from_secs(self.session.credentials_backup_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.enforcement;
        for (name, band) in [("fast_band", e.fast_band), ("slow_band", e.slow_band)] {
            if band.min_ms > band.max_ms {
                return Err(ConfigError::Validation(format!(
                    "enforcement.{name}: min_ms ({}) exceeds max_ms ({})",
                    band.min_ms, band.max_ms
                )));
            }
        }
        if e.gate_capacity == 0 {
            return Err(ConfigError::Validation(
                "enforcement.gate_capacity must be at least 1".into(),
            ));
        }
        if e.max_conversations_per_tick == 0 {
            return Err(ConfigError::Validation(
                "enforcement.max_conversations_per_tick must be at least 1".into(),
            ));
        }
        if e.nickname_change_limit == 0 {
            return Err(ConfigError::Validation(
                "enforcement.nickname_change_limit must be at least 1".into(),
            ));
        }

        let s = &self.session;
        for (name, value) in [
            ("enforcement.title_poll_interval_secs", e.title_poll_interval_secs),
            ("session.heartbeat_interval_secs", s.heartbeat_interval_secs),
            (
                "session.credentials_backup_interval_secs",
                s.credentials_backup_interval_secs,
            ),
            ("session.resync_interval_secs", s.resync_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be > 0")));
            }
        }
        if url::Url::parse(&s.bridge_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "session.bridge_url is not a valid URL: {}",
                s.bridge_url
            )));
        }
        Ok(())
    }
}
