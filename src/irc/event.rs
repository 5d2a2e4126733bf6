//! Inbound event model and line grammar.
//!
//! IRC lines are self-contained, so parsing is a single pass over one line
//! with no state carried between calls. A line that does not fit the grammar
//! becomes [`Event::fallback`] rather than an error.

use crate::irc::wire::{strip_colon, CTCP_DELIM};
use std::fmt;

/// Where an event was addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Channel or nick.
    Target(String),
    /// `KICK <channel> <target>`; the target is missing on truncated lines.
    Kick {
        channel: String,
        target: Option<String>,
    },
}

impl Destination {
    /// The channel or nick the event was addressed to.
    pub fn target(&self) -> &str {
        match self {
            Destination::Target(target) => target,
            Destination::Kick { channel, .. } => channel,
        }
    }
}

/// One parsed server line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub nick: Option<String>,
    /// Everything after `!` in the prefix, usually `user@host`.
    pub ident: Option<String>,
    pub command: Option<String>,
    pub destination: Option<Destination>,
    pub message: Option<String>,
}

impl Event {
    /// Parse one line (without its terminator). Never fails.
    pub fn parse(line: &str) -> Self {
        Self::try_parse(line).unwrap_or_else(|| Self::fallback(line))
    }

    /// The event for a line that could not be parsed: no identity, no
    /// command, the raw line as payload.
    pub fn fallback(line: &str) -> Self {
        Self {
            message: Some(line.to_string()),
            ..Self::default()
        }
    }

    fn try_parse(line: &str) -> Option<Self> {
        if let Some(rest) = line.strip_prefix("PING ") {
            return Some(Self {
                command: Some("PING".into()),
                message: Some(strip_colon(rest).to_string()),
                ..Self::default()
            });
        }

        let (nick, ident, rest) = match line.strip_prefix(':') {
            Some(prefixed) => {
                let (origin, rest) = prefixed.split_once(' ')?;
                let (nick, ident) = match origin.split_once('!') {
                    Some((nick, ident)) => (nick, Some(ident.to_string())),
                    None => (origin, None),
                };
                let nick = Some(nick.to_string()).filter(|n| !n.is_empty());
                (nick, ident, rest)
            }
            None => (None, None, line),
        };

        let (command, args) = split_token(rest);
        if command.is_empty() {
            return None;
        }

        let mut event = Self {
            nick,
            ident,
            command: Some(command.to_string()),
            ..Self::default()
        };
        let Some(args) = args else {
            return Some(event);
        };

        if let Some(trailing) = args.strip_prefix(':') {
            event.message = Some(trailing.to_string());
            return Some(event);
        }

        let (first, rest) = split_token(args);
        if command == "KICK" {
            let (target, trailing) = match rest {
                Some(rest) => {
                    let (target, trailing) = split_token(rest);
                    (Some(target.to_string()), trailing)
                }
                None => (None, None),
            };
            event.destination = Some(Destination::Kick {
                channel: first.to_string(),
                target,
            });
            event.message = trailing.map(|t| strip_colon(t).to_string());
        } else {
            event.destination = Some(Destination::Target(first.to_string()));
            event.message = rest.map(|t| strip_colon(t).to_string());
        }
        Some(event)
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn is(&self, command: &str) -> bool {
        self.command() == Some(command)
    }

    /// The channel or nick this event was addressed to, if any.
    pub fn target(&self) -> Option<&str> {
        self.destination.as_ref().map(Destination::target)
    }

    /// Three-digit server reply code, e.g. `1` for `001` (RPL_WELCOME).
    pub fn numeric(&self) -> Option<u16> {
        let command = self.command()?;
        if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
            command.parse().ok()
        } else {
            None
        }
    }

    /// Split a `\x01COMMAND args\x01` payload into command and arguments.
    pub fn ctcp(&self) -> Option<(&str, Option<&str>)> {
        let body = self.message.as_deref()?.strip_prefix(CTCP_DELIM)?;
        let body = body.strip_suffix(CTCP_DELIM).unwrap_or(body);
        match body.split_once(' ') {
            Some((command, args)) => Some((command, Some(args))),
            None => Some((body, None)),
        }
    }

    /// Text of a `/me` action.
    pub fn action(&self) -> Option<&str> {
        if !self.is("PRIVMSG") {
            return None;
        }
        match self.ctcp()? {
            ("ACTION", args) => Some(args.unwrap_or("")),
            _ => None,
        }
    }

    /// The nick to answer when this is a CTCP PING request.
    pub fn ctcp_ping_sender(&self) -> Option<&str> {
        let nick = self.nick.as_deref()?;
        let message = self.message.as_deref()?;
        (self.is("PRIVMSG") && message.starts_with("\x01PING ")).then_some(nick)
    }
}

fn split_token(s: &str) -> (&str, Option<&str>) {
    match s.split_once(' ') {
        Some((head, tail)) => (head, Some(tail)),
        None => (s, None),
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nick = self.nick.as_deref().unwrap_or("*");
        let message = self.message.as_deref().unwrap_or("");
        let Some(command) = self.command() else {
            return write!(f, "{message}");
        };
        match (command, &self.destination) {
            ("PRIVMSG", Some(dest)) => match self.action() {
                Some(action) => write!(f, "[{}] * {nick} {action}", dest.target()),
                None => write!(f, "[{}] <{nick}> {message}", dest.target()),
            },
            ("NOTICE", _) => write!(f, "-{nick}- {message}"),
            ("KICK", Some(Destination::Kick { channel, target })) => write!(
                f,
                "[{channel}] *** {nick} kicked {} ({message})",
                target.as_deref().unwrap_or("?")
            ),
            (_, dest) => {
                write!(f, "{nick} {command}")?;
                if let Some(dest) = dest {
                    write!(f, " {}", dest.target())?;
                }
                if message.is_empty() {
                    Ok(())
                } else {
                    write!(f, " {message}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping() {
        let event = Event::parse("PING :abc");
        assert_eq!(event.command(), Some("PING"));
        assert_eq!(event.message.as_deref(), Some("abc"));
        assert_eq!(event.nick, None);
        assert_eq!(event.destination, None);
    }

    #[test]
    fn test_privmsg_with_origin() {
        let event = Event::parse(":nick!ident@host PRIVMSG #chan :hello");
        assert_eq!(event.nick.as_deref(), Some("nick"));
        assert_eq!(event.ident.as_deref(), Some("ident@host"));
        assert_eq!(event.command(), Some("PRIVMSG"));
        assert_eq!(
            event.destination,
            Some(Destination::Target("#chan".into()))
        );
        assert_eq!(event.message.as_deref(), Some("hello"));
    }

    #[test]
    fn test_server_origin_without_ident() {
        let event = Event::parse(":irc.example.org 001 bot :Welcome to the network");
        assert_eq!(event.nick.as_deref(), Some("irc.example.org"));
        assert_eq!(event.ident, None);
        assert_eq!(event.numeric(), Some(1));
        assert_eq!(event.target(), Some("bot"));
        assert_eq!(event.message.as_deref(), Some("Welcome to the network"));
    }

    #[test]
    fn test_kick() {
        let event = Event::parse(":alice!a@h KICK #room bob :bye");
        assert_eq!(event.command(), Some("KICK"));
        assert_eq!(event.nick.as_deref(), Some("alice"));
        assert_eq!(event.ident.as_deref(), Some("a@h"));
        assert_eq!(
            event.destination,
            Some(Destination::Kick {
                channel: "#room".into(),
                target: Some("bob".into()),
            })
        );
        assert_eq!(event.message.as_deref(), Some("bye"));
    }

    #[test]
    fn test_kick_missing_target() {
        let event = Event::parse(":alice!a@h KICK #room");
        assert_eq!(
            event.destination,
            Some(Destination::Kick {
                channel: "#room".into(),
                target: None,
            })
        );
        assert_eq!(event.message, None);

        let event = Event::parse(":alice!a@h KICK #room bob");
        assert_eq!(event.target(), Some("#room"));
        assert_eq!(event.message, None);
    }

    #[test]
    fn test_trailing_without_destination() {
        let event = Event::parse(":bob!b@h QUIT :Client exited");
        assert_eq!(event.destination, None);
        assert_eq!(event.message.as_deref(), Some("Client exited"));

        let event = Event::parse(":bob!b@h JOIN :#room");
        assert_eq!(event.destination, None);
        assert_eq!(event.message.as_deref(), Some("#room"));
    }

    #[test]
    fn test_no_arguments() {
        let event = Event::parse(":bob!b@h AWAY");
        assert_eq!(event.command(), Some("AWAY"));
        assert_eq!(event.destination, None);
        assert_eq!(event.message, None);

        let event = Event::parse("ERROR");
        assert_eq!(event.nick, None);
        assert_eq!(event.command(), Some("ERROR"));
    }

    #[test]
    fn test_only_leading_colon_stripped_from_payload() {
        let event = Event::parse(":srv 353 bot = #room :alice @bob");
        assert_eq!(event.target(), Some("bot"));
        assert_eq!(event.message.as_deref(), Some("= #room :alice @bob"));
    }

    #[test]
    fn test_malformed_lines_fall_back() {
        for line in ["", ":", ":lonely-origin", ":nick!id@h  PRIVMSG #a :x", " "] {
            let event = Event::parse(line);
            assert_eq!(event, Event::fallback(line), "{line:?}");
            assert_eq!(event.message.as_deref(), Some(line));
            assert_eq!(event.nick, None);
            assert_eq!(event.ident, None);
            assert_eq!(event.command, None);
        }
    }

    #[test]
    fn test_ctcp_helpers() {
        let event = Event::parse(":alice!a@h PRIVMSG #room :\x01ACTION waves\x01");
        assert_eq!(event.ctcp(), Some(("ACTION", Some("waves"))));
        assert_eq!(event.action(), Some("waves"));
        assert_eq!(event.ctcp_ping_sender(), None);

        let event = Event::parse(":alice!a@h PRIVMSG bot :\x01PING 12345\x01");
        assert_eq!(event.ctcp_ping_sender(), Some("alice"));
        assert_eq!(event.action(), None);

        let event = Event::parse(":alice!a@h NOTICE bot :\x01PING 12345\x01");
        assert_eq!(event.ctcp_ping_sender(), None);
    }

    #[test]
    fn test_display() {
        let event = Event::parse(":alice!a@h PRIVMSG #room :hi there");
        assert_eq!(event.to_string(), "[#room] <alice> hi there");
        let event = Event::parse(":alice!a@h PRIVMSG #room :\x01ACTION waves\x01");
        assert_eq!(event.to_string(), "[#room] * alice waves");
        assert_eq!(Event::parse("garbage").to_string(), "* garbage");
        assert_eq!(Event::parse(":srv 001 relay").to_string(), "srv 001 relay");
        assert_eq!(
            Event::parse(":srv 001 relay :Welcome").to_string(),
            "srv 001 relay Welcome"
        );
        assert_eq!(Event::parse(":bob!b@h QUIT").to_string(), "bob QUIT");
        assert_eq!(Event::parse("").to_string(), "");
    }
}
