use crate::config::Config;
use crate::platform::daemon::DaemonStatus;
use crate::store::PolicyStore;

pub fn render_status(config: &Config, store: &PolicyStore, daemon: Option<&DaemonStatus>) -> String {
    let e = &config.enforcement;
    let mut lines = vec![
        "◆ grouplock status".to_string(),
        String::new(),
        format!("Version       {}", env!("CARGO_PKG_VERSION")),
        format!("Config        {}", config.config_path.display()),
        format!("Bridge        {}", config.session.bridge_url),
        format!(
            "Operator      {}",
            if e.operator_id.is_empty() {
                "(logged-in account)"
            } else {
                e.operator_id.as_str()
            }
        ),
        format!("Nickname      {}", e.default_nickname),
        format!(
            "Pacing        fast {}-{}ms, slow {}-{}ms, gate capacity {}",
            e.fast_band.min_ms, e.fast_band.max_ms, e.slow_band.min_ms, e.slow_band.max_ms, e.gate_capacity
        ),
        format!(
            "Title lock    poll {}s, revert after {}s, {} per tick",
            e.title_poll_interval_secs, e.title_revert_delay_secs, e.max_conversations_per_tick
        ),
        format!(
            "Cooldown      after {} changes, for {}s",
            e.nickname_change_limit, e.nickname_cooldown_secs
        ),
        String::new(),
        format!("Policies      {} ({})", store.len(), store.path().display()),
    ];

    for (conversation_id, policy) in store.snapshot() {
        let mut flags = Vec::new();
        if policy.enabled {
            flags.push(format!(
                "nick={} members={} count={}",
                policy.effective_nick(&e.default_nickname),
                policy.original.len(),
                policy.count
            ));
        }
        if policy.cooldown {
            flags.push("cooldown".to_string());
        }
        if let Some(title) = policy.locked_title() {
            flags.push(format!("title={title:?}"));
        }
        if flags.is_empty() {
            flags.push("inactive".to_string());
        }
        lines.push(format!("  {conversation_id}  {}", flags.join(", ")));
    }

    lines.push(String::new());
    match daemon {
        Some(status) => {
            lines.push(format!(
                "Daemon        {} since {} ({} reconnects)",
                status.session, status.session_since, status.reconnects
            ));
            lines.push(format!("Last update   {}", status.written_at));
        }
        None => lines.push("Daemon        no status file (not running?)".to_string()),
    }

    lines.join("\n")
}
