/// Operator command issued inside a conversation.
#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    /// `/nicklock on [nickname]`
    NickLockOn { nickname: Option<String> },
    /// `/nicklock off`
    NickLockOff,
    /// `/nickall`
    NickAll,
    /// `/gclock [title]`; no title captures the current one.
    GroupLock { title: Option<String> },
    /// `/unlockgname`
    UnlockGroupName,
}

impl Command {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}
