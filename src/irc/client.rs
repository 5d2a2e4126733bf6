use crate::config::nickname::fallback_nickname;
use crate::config::{ConnectionConfig, ServerConfig};
use crate::irc::commands::ParsedCommand;
use crate::irc::connection::{Connection, SendMode};
use crate::irc::error::{IrcError, Result};
use crate::irc::event::Event;
use crate::irc::wire;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

const RPL_WELCOME: u16 = 1;
const ERR_NICKNAMEINUSE: u16 = 433;

/// Relay-side session context: one server profile and the connection to it.
///
/// Registration runs on connect (`PASS`, `NICK`, `USER`); channels are joined
/// once the server welcomes us, and a taken nick is retried with a fallback.
pub struct IrcClient {
    conn: Arc<Connection>,
    server: ServerConfig,
    registered: AtomicBool,
    /// Set by `quit` so the poller does not reconnect behind our back.
    quitting: AtomicBool,
    nick_attempts: AtomicU32,
}

impl IrcClient {
    pub fn new(server: ServerConfig, connection: &ConnectionConfig) -> Self {
        let conn = Connection::with_options(connection.options(&server));
        Self::with_connection(server, Arc::new(conn))
    }

    pub fn with_connection(server: ServerConfig, conn: Arc<Connection>) -> Self {
        Self {
            conn,
            server,
            registered: AtomicBool::new(false),
            quitting: AtomicBool::new(false),
            nick_attempts: AtomicU32::new(0),
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// True once `001` has been seen on the current session.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Channel plain console text goes to.
    pub fn default_channel(&self) -> Option<&str> {
        self.server.channels.first().map(String::as_str)
    }

    /// Connect and register. Commands are buffered and flushed together.
    pub async fn connect(&self) -> Result<()> {
        let server = &self.server;
        self.conn.connect(&server.host, server.port, server.tls).await?;
        self.registered.store(false, Ordering::Release);
        self.quitting.store(false, Ordering::Release);
        self.nick_attempts.store(0, Ordering::Release);

        if let Some(password) = &server.password {
            self.conn.set_password(password, SendMode::Buffered).await?;
        }
        self.conn.set_nick(&server.nickname, SendMode::Buffered).await?;
        self.conn
            .set_user(server.ident(), server.realname.as_deref(), SendMode::Buffered)
            .await?;
        self.conn.flush().await
    }

    /// Reconnect if the connection is gone. Returns true when a new session
    /// was established. After [`IrcClient::quit`] this fails with
    /// [`IrcError::NotConnected`] until `connect` is called again.
    pub async fn ensure_connected(&self) -> Result<bool> {
        if self.conn.is_connected() {
            return Ok(false);
        }
        if self.quitting.load(Ordering::Acquire) {
            return Err(IrcError::NotConnected);
        }
        self.connect().await?;
        tracing::info!(host = %self.server.host, "IRC (re)connected.");
        Ok(true)
    }

    /// Next inbound event, without blocking. Keeps the session alive and
    /// handles registration replies before handing the event back.
    pub async fn poll(&self) -> Result<Option<Event>> {
        self.ensure_connected().await?;
        let Some(event) = self.conn.parse_next_event(false).await? else {
            return Ok(None);
        };
        self.on_event(&event).await?;
        Ok(Some(event))
    }

    async fn on_event(&self, event: &Event) -> Result<()> {
        match event.numeric() {
            Some(RPL_WELCOME) => {
                self.registered.store(true, Ordering::Release);
                if !self.server.channels.is_empty() {
                    self.conn
                        .join(
                            &self.server.channels,
                            self.server.channel_key.as_deref(),
                            SendMode::Immediate,
                        )
                        .await?;
                }
            }
            Some(ERR_NICKNAMEINUSE) if !self.is_registered() => {
                let attempt = self.nick_attempts.fetch_add(1, Ordering::AcqRel) + 1;
                let nick = fallback_nickname(&self.server.nickname, attempt);
                tracing::warn!(taken = %self.server.nickname, %nick, "nickname in use, retrying");
                self.conn.set_nick(&nick, SendMode::Immediate).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Run one console command. Returns `false` once the session should end.
    pub async fn execute(&self, command: ParsedCommand) -> Result<bool> {
        let conn = &self.conn;
        let now = SendMode::Immediate;
        match command {
            ParsedCommand::Join { channels, key } => {
                if wire::join_targets(&channels).is_empty() {
                    tracing::warn!("no channel to join");
                    return Ok(true);
                }
                conn.join(&channels, key.as_deref(), now).await?
            }
            ParsedCommand::Part { channels, reason } => {
                let channels = if channels.is_empty() {
                    self.default_channel().map(str::to_string).into_iter().collect()
                } else {
                    channels
                };
                if wire::join_targets(&channels).is_empty() {
                    tracing::warn!("no channel to part");
                    return Ok(true);
                }
                conn.part(&channels, reason.as_deref(), now).await?
            }
            ParsedCommand::Nick { nick } => conn.set_nick(&nick, now).await?,
            ParsedCommand::Msg { target, text } => conn.say(&target, &text, now).await?,
            ParsedCommand::Say { text } => match self.default_channel() {
                Some(channel) => conn.say(channel, &text, now).await?,
                None => tracing::warn!("no channel configured for plain text"),
            },
            ParsedCommand::Me { text } => match self.default_channel() {
                Some(channel) => conn.act(channel, &text, now).await?,
                None => tracing::warn!("no channel configured for /me"),
            },
            ParsedCommand::Notice { target, text } => conn.notice(&target, text.as_deref(), now).await?,
            ParsedCommand::Mode { target, modes } => conn.set_mode(&target, modes.as_deref(), now).await?,
            ParsedCommand::Kick { channel, user, reason } => {
                let Some(channel) = channel.as_deref().or(self.default_channel()) else {
                    tracing::warn!("no channel to kick {} from", user);
                    return Ok(true);
                };
                conn.kick(channel, &user, reason.as_deref(), now).await?
            }
            ParsedCommand::Away { message } => conn.set_away(message.as_deref(), now).await?,
            ParsedCommand::Invite { nick, channel } => {
                let Some(channel) = channel.as_deref().or(self.default_channel()) else {
                    tracing::warn!("no channel to invite {} to", nick);
                    return Ok(true);
                };
                conn.invite(&nick, channel, now).await?
            }
            ParsedCommand::Topic { channel, text } => {
                let Some(channel) = channel.as_deref().or(self.default_channel()) else {
                    tracing::warn!("no channel for /topic");
                    return Ok(true);
                };
                conn.set_topic(channel, text.as_deref(), now).await?
            }
            ParsedCommand::Raw { command } => conn.quote(&command, now).await?,
            // Rendered by the front end.
            ParsedCommand::Help => {}
            ParsedCommand::Quit { message } => {
                self.quit(message.as_deref()).await;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Flush pending commands, QUIT and close.
    pub async fn quit(&self, message: Option<&str>) {
        let message = message.unwrap_or(&self.server.quit_message);
        self.quitting.store(true, Ordering::Release);
        self.conn.disconnect(Some(message), true).await;
        self.registered.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::commands::parse_command;
    use crate::irc::connection::ConnectionOptions;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    async fn client(channels: &[&str]) -> (IrcClient, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: listener.local_addr().unwrap().port(),
            nickname: "relay".into(),
            password: Some("pw".into()),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            ..ServerConfig::default()
        };
        let conn = Connection::with_options(ConnectionOptions {
            timeout: Duration::from_secs(5),
            quit_grace: Duration::from_millis(10),
            ..ConnectionOptions::default()
        });
        (IrcClient::with_connection(server, Arc::new(conn)), listener)
    }

    async fn next(server: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        server.read_line(&mut line).await.unwrap();
        line
    }

    async fn poll_until(client: &IrcClient, command: &str) -> Event {
        for _ in 0..200 {
            if let Some(event) = client.poll().await.unwrap() {
                if event.is(command) {
                    return event;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no {command} event");
    }

    #[tokio::test]
    async fn test_register_then_join_on_welcome() {
        let (client, listener) = client(&["#one", "#two"]).await;
        let (connected, accept) = tokio::join!(client.ensure_connected(), listener.accept());
        assert!(connected.unwrap());
        let mut server = BufReader::new(accept.unwrap().0);

        assert_eq!(next(&mut server).await, "PASS pw\r\n");
        assert_eq!(next(&mut server).await, "NICK relay\r\n");
        assert_eq!(next(&mut server).await, "USER relay relay 127.0.0.1 :relay\r\n");

        server
            .get_mut()
            .write_all(b":srv 001 relay :Welcome\r\n")
            .await
            .unwrap();
        poll_until(&client, "001").await;
        assert!(client.is_registered());
        assert_eq!(next(&mut server).await, "JOIN #one,#two\r\n");

        // Already connected: nothing to do.
        assert!(!client.ensure_connected().await.unwrap());
    }

    #[tokio::test]
    async fn test_nick_in_use_retries_with_fallback() {
        let (client, listener) = client(&[]).await;
        let (connected, accept) = tokio::join!(client.connect(), listener.accept());
        connected.unwrap();
        let mut server = BufReader::new(accept.unwrap().0);
        for _ in 0..3 {
            next(&mut server).await;
        }

        server
            .get_mut()
            .write_all(b":srv 433 * relay :Nickname is already in use\r\n")
            .await
            .unwrap();
        poll_until(&client, "433").await;
        assert_eq!(next(&mut server).await, "NICK relay_\r\n");
        assert_eq!(client.connection().nick().await.as_deref(), Some("relay_"));
    }

    #[tokio::test]
    async fn test_channel_commands_without_a_channel_send_nothing() {
        let (client, listener) = client(&[]).await;
        let (connected, accept) = tokio::join!(client.connect(), listener.accept());
        connected.unwrap();
        let mut server = BufReader::new(accept.unwrap().0);
        for _ in 0..3 {
            next(&mut server).await;
        }

        let part = parse_command("/part gone fishing").unwrap();
        assert!(client.execute(part).await.unwrap());
        let join = ParsedCommand::Join { channels: vec![" ".into(), "\r\n".into()], key: None };
        assert!(client.execute(join).await.unwrap());
        let kick = parse_command("/kick bob").unwrap();
        assert!(client.execute(kick).await.unwrap());

        client.connection().quote("PING :marker", SendMode::Immediate).await.unwrap();
        assert_eq!(next(&mut server).await, "PING :marker\r\n");
    }

    #[tokio::test]
    async fn test_console_commands_and_quit() {
        let (client, listener) = client(&["#home"]).await;
        let (connected, accept) = tokio::join!(client.connect(), listener.accept());
        connected.unwrap();
        let mut server = BufReader::new(accept.unwrap().0);
        for _ in 0..3 {
            next(&mut server).await;
        }

        for input in ["hello all", "/me waves", "/kick bob spam", "/topic fresh", "/msg bob hi"] {
            let command = parse_command(input).unwrap();
            assert!(client.execute(command).await.unwrap());
        }
        assert_eq!(next(&mut server).await, "PRIVMSG #home :hello all\r\n");
        assert_eq!(next(&mut server).await, "PRIVMSG #home :\x01ACTION waves\x01\r\n");
        assert_eq!(next(&mut server).await, "KICK #home bob :spam\r\n");
        assert_eq!(next(&mut server).await, "TOPIC #home :fresh\r\n");
        assert_eq!(next(&mut server).await, "PRIVMSG bob :hi\r\n");

        let quit = parse_command("/quit see you").unwrap();
        assert!(!client.execute(quit).await.unwrap());
        assert_eq!(next(&mut server).await, "QUIT :see you\r\n");
        assert!(!client.connection().is_connected());
        assert!(matches!(client.poll().await, Err(IrcError::NotConnected)));
    }
}
