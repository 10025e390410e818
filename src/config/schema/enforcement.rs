use serde::{Deserialize, Serialize};

/// Inclusive millisecond range a pacing delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayBand {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayBand {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn contains(&self, value_ms: u64) -> bool {
        (self.min_ms..=self.max_ms).contains(&value_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Identity allowed to issue `/nicklock`, `/gclock` and friends.
    #[serde(default)]
    pub operator_id: String,
    /// Nickname applied when a policy has none of its own.
    #[serde(default = "default_nickname")]
    pub default_nickname: String,
    #[serde(default = "default_poll_interval_secs")]
    pub title_poll_interval_secs: u64,
    /// Grace window between first seeing a title divergence and reverting it.
    #[serde(default = "default_revert_delay_secs")]
    pub title_revert_delay_secs: u64,
    /// Upper bound of conversations checked on one poll tick.
    #[serde(default = "default_max_per_tick")]
    pub max_conversations_per_tick: usize,
    #[serde(default = "default_fast_band")]
    pub fast_band: DelayBand,
    #[serde(default = "default_slow_band")]
    pub slow_band: DelayBand,
    #[serde(default = "default_nickname_change_limit")]
    pub nickname_change_limit: u32,
    #[serde(default = "default_cooldown_secs")]
    pub nickname_cooldown_secs: u64,
    /// Concurrent outbound mutation calls allowed system-wide.
    #[serde(default = "default_gate_capacity")]
    pub gate_capacity: usize,
    /// Pause between consecutive tasks of one conversation queue.
    #[serde(default = "default_queue_pacing_ms")]
    pub queue_pacing_ms: u64,
}

fn default_nickname() -> String {
    "🔒 locked".into()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_revert_delay_secs() -> u64 {
    47
}

fn default_max_per_tick() -> usize {
    10
}

fn default_fast_band() -> DelayBand {
    DelayBand::new(5_000, 7_000)
}

fn default_slow_band() -> DelayBand {
    DelayBand::new(12_000, 13_000)
}

fn default_nickname_change_limit() -> u32 {
    50
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_gate_capacity() -> usize {
    1
}

fn default_queue_pacing_ms() -> u64 {
    250
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            operator_id: String::new(),
            default_nickname: default_nickname(),
            title_poll_interval_secs: default_poll_interval_secs(),
            title_revert_delay_secs: default_revert_delay_secs(),
            max_conversations_per_tick: default_max_per_tick(),
            fast_band: default_fast_band(),
            slow_band: default_slow_band(),
            nickname_change_limit: default_nickname_change_limit(),
            nickname_cooldown_secs: default_cooldown_secs(),
            gate_capacity: default_gate_capacity(),
            queue_pacing_ms: default_queue_pacing_ms(),
        }
    }
}
