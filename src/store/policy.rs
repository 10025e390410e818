use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Enforcement configuration and counters for one conversation.
///
/// Serialized field names match the on-disk `groupData.json` layout so
/// existing stores load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Nickname enforcement active.
    #[serde(default)]
    pub enabled: bool,
    /// Nickname enforced for members without a snapshot entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    /// Per-member enforced nickname captured at activation or membership sync.
    #[serde(default)]
    pub original: BTreeMap<String, String>,
    /// Corrective actions since the last cooldown reset.
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub cooldown: bool,
    /// Title enforcement active.
    #[serde(default)]
    pub gclock: bool,
    #[serde(
        default,
        rename = "groupName",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_name: Option<String>,
}

impl Policy {
    /// `original[member] ?? nick ?? default_nickname`
    pub fn desired_nickname<'a>(&'a self, member_id: &str, default_nickname: &'a str) -> &'a str {
        self.original
            .get(member_id)
            .map(String::as_str)
            .or(self.nick.as_deref())
            .unwrap_or(default_nickname)
    }

    pub fn effective_nick<'a>(&'a self, default_nickname: &'a str) -> &'a str {
        self.nick.as_deref().unwrap_or(default_nickname)
    }

    /// Whether a nickname correction may be enqueued right now.
    pub fn accepts_nickname_corrections(&self) -> bool {
        self.enabled && !self.cooldown
    }

    /// Neither nickname nor title enforcement active; retained but inert.
    pub fn is_inert(&self) -> bool {
        !self.enabled && !self.gclock
    }

    /// Enforced title, when title enforcement is active.
    pub fn locked_title(&self) -> Option<&str> {
        if self.gclock {
            self.group_name.as_deref()
        } else {
            None
        }
    }

    /// Drops snapshot entries for members no longer present and captures
    /// newcomers with the policy nickname. Returns the ids that were added.
    pub fn sync_membership<'m, I>(&mut self, members: I, default_nickname: &str) -> Vec<String>
    where
        I: IntoIterator<Item = &'m str>,
    {
        let current: Vec<&str> = members.into_iter().collect();
        self.original
            .retain(|member_id, _| current.contains(&member_id.as_str()));

        let nick = self.effective_nick(default_nickname).to_string();
        let mut added = Vec::new();
        for member_id in current {
            if !self.original.contains_key(member_id) {
                self.original.insert(member_id.to_string(), nick.clone());
                added.push(member_id.to_string());
            }
        }
        added
    }
}

/// Result of counting one successful nickname correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionOutcome {
    pub count: u32,
    /// True when this correction pushed the policy into cooldown.
    pub entered_cooldown: bool,
}
