//! Console command parser.
//!
//! Parses `/command arg1 arg2 ...` input lines into typed [`ParsedCommand`]
//! values that [`IrcClient::execute`] turns into IRC commands. Input without
//! a leading `/` is chat text for the default channel.
//!
//! [`IrcClient::execute`]: crate::irc::client::IrcClient::execute

pub const HELP: &str = "\
Commands:
  /join <#chan[,#chan]> [key]     /part [#chan] [reason]
  /msg <target> <text>            /me <action>
  /notice <target> [text]         /topic [#chan] [text]
  /mode <target> [modes]          /kick [#chan] <nick> [reason]
  /invite <nick> [#chan]          /away [message]
  /nick <nick>                    /quote <raw line>
  /quit [message]                 /help
Anything else is sent to the first configured channel.";

/// A parsed console command. Each variant corresponds to a `/command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Join { channels: Vec<String>, key: Option<String> },
    Part { channels: Vec<String>, reason: Option<String> },
    Nick { nick: String },
    Msg { target: String, text: String },
    /// Plain text for the default channel.
    Say { text: String },
    Me { text: String },
    Notice { target: String, text: Option<String> },
    Mode { target: String, modes: Option<String> },
    Kick { channel: Option<String>, user: String, reason: Option<String> },
    Away { message: Option<String> },
    Invite { nick: String, channel: Option<String> },
    Topic { channel: Option<String>, text: Option<String> },
    Raw { command: String },
    Quit { message: Option<String> },
    Help,
}

fn is_channel(s: &str) -> bool {
    s.starts_with('#') || s.starts_with('&')
}

fn channel_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .filter(|c| !c.is_empty())
        .map(|c| if is_channel(c) { c.to_string() } else { format!("#{}", c) })
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse one console line into a [`ParsedCommand`].
///
/// Returns `None` for blank input, unknown commands, and commands missing a
/// required argument. Command names are case-insensitive.
pub fn parse_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let Some(body) = input.strip_prefix('/') else {
        return Some(ParsedCommand::Say { text: input.to_string() });
    };

    let parts: Vec<&str> = body.splitn(3, ' ').collect();
    let cmd = parts.first()?.to_lowercase();
    // Everything after the command name.
    let rest = body.split_once(' ').map(|(_, rest)| rest);

    match cmd.as_str() {
        "join" | "j" => {
            let channels = channel_list(parts.get(1)?);
            if channels.is_empty() {
                return None;
            }
            let key = non_empty(parts.get(2).copied());
            Some(ParsedCommand::Join { channels, key })
        }
        "part" | "leave" => {
            let arg1 = parts.get(1).copied();
            let (channels, reason) = match arg1 {
                Some(a) if is_channel(a) => (channel_list(a), non_empty(parts.get(2).copied())),
                // First arg is reason text, not a channel
                Some(_) => (vec![], non_empty(rest)),
                None => (vec![], None),
            };
            Some(ParsedCommand::Part { channels, reason })
        }
        "nick" => {
            let nick = non_empty(parts.get(1).copied())?;
            Some(ParsedCommand::Nick { nick })
        }
        "msg" | "query" => {
            let target = parts.get(1)?.to_string();
            let text = non_empty(parts.get(2).copied())?;
            Some(ParsedCommand::Msg { target, text })
        }
        "me" => {
            let text = rest.unwrap_or("").to_string();
            Some(ParsedCommand::Me { text })
        }
        "notice" => {
            let target = parts.get(1)?.to_string();
            let text = non_empty(parts.get(2).copied());
            Some(ParsedCommand::Notice { target, text })
        }
        "mode" => {
            let target = parts.get(1)?.to_string();
            let modes = non_empty(parts.get(2).copied());
            Some(ParsedCommand::Mode { target, modes })
        }
        "kick" => {
            let arg1 = parts.get(1)?.to_string();
            let rest = parts.get(2).map(|s| s.to_string());
            if is_channel(&arg1) {
                // /kick #channel user [reason]
                let rest = rest?;
                let mut sp = rest.splitn(2, ' ');
                let user = sp.next().filter(|u| !u.is_empty())?.to_string();
                let reason = non_empty(sp.next());
                Some(ParsedCommand::Kick { channel: Some(arg1), user, reason })
            } else {
                // /kick user [reason]
                Some(ParsedCommand::Kick { channel: None, user: arg1, reason: non_empty(rest.as_deref()) })
            }
        }
        "away" => Some(ParsedCommand::Away { message: non_empty(rest) }),
        "invite" => {
            let nick = parts.get(1)?.to_string();
            let channel = parts.get(2).map(|c| c.trim()).filter(|c| is_channel(c)).map(str::to_string);
            Some(ParsedCommand::Invite { nick, channel })
        }
        "topic" | "t" => match parts.get(1).copied() {
            Some(a) if is_channel(a) => Some(ParsedCommand::Topic {
                channel: Some(a.to_string()),
                text: non_empty(parts.get(2).copied()),
            }),
            _ => Some(ParsedCommand::Topic { channel: None, text: non_empty(rest) }),
        },
        "quote" | "raw" => {
            let command = non_empty(rest)?;
            Some(ParsedCommand::Raw { command })
        }
        "quit" | "exit" => Some(ParsedCommand::Quit { message: non_empty(rest) }),
        "help" | "h" => Some(ParsedCommand::Help),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_and_blank() {
        assert_eq!(parse_command("  hi there "), Some(ParsedCommand::Say { text: "hi there".into() }));
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("/bogus"), None);
    }

    #[test]
    fn test_join_and_part() {
        assert_eq!(
            parse_command("/JOIN rust,#relay key"),
            Some(ParsedCommand::Join {
                channels: vec!["#rust".into(), "#relay".into()],
                key: Some("key".into()),
            })
        );
        assert_eq!(parse_command("/join"), None);
        assert_eq!(
            parse_command("/part #a,#b gone fishing"),
            Some(ParsedCommand::Part {
                channels: vec!["#a".into(), "#b".into()],
                reason: Some("gone fishing".into()),
            })
        );
        assert_eq!(
            parse_command("/part gone fishing"),
            Some(ParsedCommand::Part { channels: vec![], reason: Some("gone fishing".into()) })
        );
    }

    #[test]
    fn test_kick_forms() {
        assert_eq!(
            parse_command("/kick #room bob too loud"),
            Some(ParsedCommand::Kick {
                channel: Some("#room".into()),
                user: "bob".into(),
                reason: Some("too loud".into()),
            })
        );
        assert_eq!(
            parse_command("/kick bob"),
            Some(ParsedCommand::Kick { channel: None, user: "bob".into(), reason: None })
        );
        assert_eq!(parse_command("/kick #room"), None);
    }

    #[test]
    fn test_optional_arguments() {
        assert_eq!(parse_command("/away"), Some(ParsedCommand::Away { message: None }));
        assert_eq!(
            parse_command("/away out for lunch"),
            Some(ParsedCommand::Away { message: Some("out for lunch".into()) })
        );
        assert_eq!(
            parse_command("/topic #room new topic"),
            Some(ParsedCommand::Topic { channel: Some("#room".into()), text: Some("new topic".into()) })
        );
        assert_eq!(
            parse_command("/topic"),
            Some(ParsedCommand::Topic { channel: None, text: None })
        );
        assert_eq!(
            parse_command("/mode #room +m"),
            Some(ParsedCommand::Mode { target: "#room".into(), modes: Some("+m".into()) })
        );
        assert_eq!(
            parse_command("/invite bob #room"),
            Some(ParsedCommand::Invite { nick: "bob".into(), channel: Some("#room".into()) })
        );
        assert_eq!(
            parse_command("/notice bob"),
            Some(ParsedCommand::Notice { target: "bob".into(), text: None })
        );
    }

    #[test]
    fn test_raw_and_quit() {
        assert_eq!(
            parse_command("/quote WHOIS bob"),
            Some(ParsedCommand::Raw { command: "WHOIS bob".into() })
        );
        assert_eq!(parse_command("/raw"), None);
        assert_eq!(parse_command("/quit"), Some(ParsedCommand::Quit { message: None }));
        assert_eq!(
            parse_command("/exit bye now"),
            Some(ParsedCommand::Quit { message: Some("bye now".into()) })
        );
        assert_eq!(parse_command("/msg bob"), None);
        assert_eq!(parse_command("/help"), Some(ParsedCommand::Help));
    }
}
