use super::types::Command;

/// Parses an operator command. The verb is case-insensitive; arguments keep
/// their case. Anything unrecognized is not a command.
pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next()?.to_lowercase();
    let args = parts.next().unwrap_or("").trim();

    match cmd.as_str() {
        "/nicklock" => parse_nicklock(args),
        "/nickall" if args.is_empty() => Some(Command::NickAll),
        "/gclock" => Some(Command::GroupLock {
            title: non_empty(args),
        }),
        "/unlockgname" if args.is_empty() => Some(Command::UnlockGroupName),
        _ => None,
    }
}

fn parse_nicklock(args: &str) -> Option<Command> {
    let mut parts = args.splitn(2, char::is_whitespace);
    let toggle = parts.next()?.to_lowercase();
    let rest = parts.next().unwrap_or("").trim();

    match toggle.as_str() {
        "on" => Some(Command::NickLockOn {
            nickname: non_empty(rest),
        }),
        "off" if rest.is_empty() => Some(Command::NickLockOff),
        _ => None,
    }
}

fn non_empty(args: &str) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.to_string())
    }
}
