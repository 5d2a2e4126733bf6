//! Chat transcript logging to disk.
//!
//! When enabled, relayed traffic is appended to daily log files organized by
//! channel or query. Log files are named `<target>_<date>.log` and stored in
//! the configured log directory (default: `~/.local/share/crabrelay/logs/`).

use crate::config::LoggingConfig;
use crate::irc::event::{Destination, Event};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Writes inbound chat events to per-channel/query daily log files.
///
/// File handles are cached for the lifetime of the logger. A file that cannot
/// be opened is remembered as unavailable and its lines are dropped.
pub struct ChatLogger {
    enabled: bool,
    log_dir: PathBuf,
    log_channels: bool,
    log_queries: bool,
    file_handles: HashMap<String, Option<fs::File>>,
    /// Lowercased nick to the channels it was last seen in.
    presence: HashMap<String, HashSet<String>>,
}

impl ChatLogger {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.enabled,
            log_dir: expand_home(&config.log_dir),
            log_channels: config.log_channels,
            log_queries: config.log_queries,
            file_handles: HashMap::new(),
            presence: HashMap::new(),
        }
    }

    /// Append `event` to the log of the channel or query it belongs to.
    /// QUIT lines go to every channel the nick was seen in.
    /// No-op if logging is disabled or the event is not chat traffic.
    pub fn log_event(&mut self, event: &Event) {
        if !self.enabled {
            return;
        }
        let targets = self.log_targets(event);
        self.track_presence(event);
        if targets.is_empty() {
            return;
        }
        let Some(line) = format_line(event) else {
            return;
        };
        for target in targets {
            self.write_line(&target, &line);
        }
    }

    fn write_line(&mut self, target: &str, line: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let date = chrono::Local::now().format("%Y-%m-%d");
        let filename = format!("{}_{}.log", sanitize_target(target), date);
        let filepath = self.log_dir.join(&filename);
        let log_dir = &self.log_dir;

        let handle = self.file_handles.entry(filename).or_insert_with(|| {
            let _ = fs::create_dir_all(log_dir);
            match OpenOptions::new().create(true).append(true).open(&filepath) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!(path = %filepath.display(), error = %e, "cannot open chat log");
                    None
                }
            }
        });

        if let Some(file) = handle {
            let _ = writeln!(file, "[{}] {}", timestamp, line);
        }
    }

    fn log_targets(&self, event: &Event) -> Vec<String> {
        if !event.is("QUIT") {
            return self.log_target(event).into_iter().collect();
        }
        let nick = event.nick.as_deref().map(str::to_lowercase);
        let Some(channels) = nick.and_then(|nick| self.presence.get(&nick)) else {
            return Vec::new();
        };
        if !self.log_channels {
            return Vec::new();
        }
        let mut channels: Vec<String> = channels.iter().cloned().collect();
        channels.sort();
        channels
    }

    fn log_target(&self, event: &Event) -> Option<String> {
        let target = match &event.destination {
            Some(Destination::Target(t)) => t.as_str(),
            Some(Destination::Kick { channel, .. }) => channel.as_str(),
            // `JOIN :#channel`
            None if event.is("JOIN") => event.message.as_deref()?,
            None => return None,
        };
        if is_channel(target) {
            self.log_channels.then(|| target.to_string())
        } else if event.is("PRIVMSG") || event.is("NOTICE") {
            // Queries are filed under the other party.
            let nick = event.nick.as_deref()?;
            self.log_queries.then(|| nick.to_string())
        } else {
            None
        }
    }

    /// Follow which channels each nick is in, so a QUIT (which names no
    /// channel) can be filed where it was seen.
    fn track_presence(&mut self, event: &Event) {
        let Some(command) = event.command() else {
            return;
        };
        if command == "353" {
            // `:srv 353 me = #chan :nick @op +voice`
            let Some((channel, names)) = event.message.as_deref().and_then(parse_names) else {
                return;
            };
            for name in names.split_whitespace() {
                let nick = name.trim_start_matches(['@', '+', '%', '&', '~']);
                if !nick.is_empty() {
                    self.enter(nick, channel);
                }
            }
            return;
        }

        let Some(nick) = event.nick.as_deref() else {
            return;
        };
        match (command, &event.destination) {
            ("JOIN", _) => {
                if let Some(channel) = event.target().or(event.message.as_deref()) {
                    self.enter(nick, channel);
                }
            }
            ("PRIVMSG" | "NOTICE", Some(Destination::Target(channel))) if is_channel(channel) => {
                self.enter(nick, channel);
            }
            ("PART", Some(Destination::Target(channel))) => self.leave(nick, channel),
            ("KICK", Some(Destination::Kick { channel, target: Some(target) })) => {
                self.leave(target, channel);
            }
            ("NICK", _) => {
                let Some(new_nick) = event.target().or(event.message.as_deref()) else {
                    return;
                };
                if let Some(channels) = self.presence.remove(&nick.to_lowercase()) {
                    self.presence.insert(new_nick.to_lowercase(), channels);
                }
            }
            ("QUIT", _) => {
                self.presence.remove(&nick.to_lowercase());
            }
            _ => {}
        }
    }

    fn enter(&mut self, nick: &str, channel: &str) {
        if is_channel(channel) {
            self.presence
                .entry(nick.to_lowercase())
                .or_default()
                .insert(channel.to_string());
        }
    }

    fn leave(&mut self, nick: &str, channel: &str) {
        let key = nick.to_lowercase();
        if let Some(channels) = self.presence.get_mut(&key) {
            channels.remove(channel);
            if channels.is_empty() {
                self.presence.remove(&key);
            }
        }
    }
}

/// Channel and name list of a `353` (RPL_NAMREPLY) payload.
fn parse_names(payload: &str) -> Option<(&str, &str)> {
    let mut parts = payload.splitn(3, ' ');
    let _visibility = parts.next()?;
    let channel = parts.next()?;
    let names = parts.next()?;
    Some((channel, names.strip_prefix(':').unwrap_or(names)))
}

fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

fn format_line(event: &Event) -> Option<String> {
    let nick = event.nick.as_deref().unwrap_or("*");
    let message = event.message.as_deref().unwrap_or("");
    let line = match event.command()? {
        "PRIVMSG" => match event.action() {
            Some(action) => format!("* {} {}", nick, action),
            None if event.ctcp().is_some() => return None,
            None => format!("<{}> {}", nick, message),
        },
        "NOTICE" => format!("-{}- {}", nick, message),
        "JOIN" => format!("*** {} joined", nick),
        "PART" => format!("*** {} left ({})", nick, message),
        "KICK" => match &event.destination {
            Some(Destination::Kick { target, .. }) => format!(
                "*** {} kicked {} ({})",
                nick,
                target.as_deref().unwrap_or("?"),
                message
            ),
            _ => return None,
        },
        "TOPIC" => format!("*** {} set topic: {}", nick, message),
        "QUIT" => format!("*** {} quit ({})", nick, message),
        _ => return None,
    };
    Some(line)
}

fn sanitize_target(target: &str) -> String {
    target
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Expand a leading `~/` to the home directory.
fn expand_home(dir: &str) -> PathBuf {
    match dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(dir)),
        None => PathBuf::from(dir),
    }
}
