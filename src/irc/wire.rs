//! Outbound line formatting.
//!
//! Builders here return the textual command, possibly several commands joined
//! by `\n` for multi-line bodies. [`frame`] turns that text into the CRLF
//! terminated bytes that actually go on the wire, so no builder output can
//! smuggle a bare `\r` or `\n` past the terminator.

/// CTCP delimiter.
pub const CTCP_DELIM: char = '\x01';

/// Remove one leading `:` (the trailing-parameter marker).
pub fn strip_colon(s: &str) -> &str {
    s.strip_prefix(':').unwrap_or(s)
}

/// Sanitize a token that must not contain whitespace: nick, channel, ident,
/// target, host or key.
pub fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '\r' | '\n' | ' '))
        .collect()
}

/// Sanitize freeform trailing text: drop `\r`, trim surrounding newlines and
/// collapse embedded ones to spaces.
pub fn flatten(s: &str) -> String {
    s.replace('\r', "").trim_matches('\n').replace('\n', " ")
}

/// Non-empty lines of a message body, one outbound command each.
pub fn body_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n']).filter(|line| !line.is_empty())
}

/// Comma-join a collection of channel (or nick) names.
pub fn join_targets<I, S>(targets: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    targets
        .into_iter()
        .map(|t| squash(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Frame raw command text into wire bytes. Every non-empty line becomes one
/// CRLF-terminated command; blank lines are dropped.
pub fn frame(raw: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 2);
    for line in body_lines(raw) {
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

fn trailing(prefix: &str, text: Option<&str>) -> String {
    match text {
        Some(text) => format!("{prefix} :{}", flatten(text)),
        None => prefix.to_string(),
    }
}

pub fn pass(password: &str) -> String {
    format!("PASS {}", flatten(password))
}

pub fn nick(nick: &str) -> String {
    format!("NICK {}", squash(nick))
}

pub fn user(ident: &str, host: &str, realname: &str) -> String {
    let ident = squash(ident);
    format!("USER {ident} {ident} {} :{}", squash(host), flatten(realname))
}

pub fn join<I, S>(channels: I, key: Option<&str>) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let channels = join_targets(channels);
    match key {
        Some(key) => format!("JOIN {channels} {}", squash(key)),
        None => format!("JOIN {channels}"),
    }
}

pub fn part<I, S>(channels: I, reason: Option<&str>) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    trailing(&format!("PART {}", join_targets(channels)), reason)
}

pub fn privmsg(dest: &str, text: &str) -> String {
    let dest = squash(dest);
    body_lines(text)
        .map(|line| format!("PRIVMSG {dest} :{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// CTCP ACTION, one per input line.
pub fn action(dest: &str, text: &str) -> String {
    let dest = squash(dest);
    body_lines(text)
        .map(|line| format!("PRIVMSG {dest} :{CTCP_DELIM}ACTION {line}{CTCP_DELIM}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Channel modes are passed as middle parameters, user modes as trailing.
pub fn mode(target: &str, mode: Option<&str>) -> String {
    let target = squash(target);
    match mode {
        Some(mode) if is_channel(&target) => format!("MODE {target} {}", flatten(mode)),
        Some(mode) => format!("MODE {target} :{}", flatten(mode)),
        None => format!("MODE {target}"),
    }
}

pub fn kick(channel: &str, target: &str, reason: Option<&str>) -> String {
    trailing(
        &format!("KICK {} {}", squash(channel), squash(target)),
        reason,
    )
}

pub fn away(state: Option<&str>) -> String {
    trailing("AWAY", state)
}

pub fn invite(target: &str, channel: &str) -> String {
    format!("INVITE {} {}", squash(target), squash(channel))
}

/// `NOTICE <dest>` without text, otherwise one NOTICE per input line.
pub fn notice(dest: &str, text: Option<&str>) -> String {
    let dest = squash(dest);
    match text {
        Some(text) => {
            let lines: Vec<String> = body_lines(text)
                .map(|line| format!("NOTICE {dest} :{line}"))
                .collect();
            if lines.is_empty() {
                format!("NOTICE {dest}")
            } else {
                lines.join("\n")
            }
        }
        None => format!("NOTICE {dest}"),
    }
}

pub fn topic(channel: &str, topic: Option<&str>) -> String {
    trailing(&format!("TOPIC {}", squash(channel)), topic)
}

pub fn quit(reason: Option<&str>) -> String {
    trailing("QUIT", reason)
}

/// Keepalive reply echoing whatever followed `PING `.
pub fn pong(rest: &str) -> String {
    format!("PONG {}", flatten(rest))
}
