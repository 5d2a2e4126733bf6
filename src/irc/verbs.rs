//! High-level command methods on [`Connection`].
//!
//! Each method formats its command through [`wire`] and hands it to
//! [`Connection::quote`], so every one of them accepts a [`SendMode`].

use crate::irc::connection::{Connection, SendMode};
use crate::irc::error::Result;
use crate::irc::wire;

impl Connection {
    /// Server password. Send it before [`Connection::set_nick`].
    pub async fn set_password(&self, password: &str, mode: SendMode) -> Result<()> {
        self.quote(&wire::pass(password), mode).await
    }

    /// Change nick. The new nick is remembered as soon as it is sent, before
    /// the server confirms it.
    pub async fn set_nick(&self, nick: &str, mode: SendMode) -> Result<()> {
        let nick = wire::squash(nick);
        self.remember_nick(nick.clone()).await;
        self.quote(&wire::nick(&nick), mode).await
    }

    /// `USER` registration; the real name defaults to the ident.
    pub async fn set_user(&self, ident: &str, realname: Option<&str>, mode: SendMode) -> Result<()> {
        let host = self
            .address()
            .await
            .map(|(host, _)| host)
            .unwrap_or_else(|| "*".to_string());
        let line = wire::user(ident, &host, realname.unwrap_or(ident));
        self.quote(&line, mode).await
    }

    pub async fn join<I, S>(&self, channels: I, key: Option<&str>, mode: SendMode) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.quote(&wire::join(channels, key), mode).await
    }

    pub async fn part<I, S>(&self, channels: I, reason: Option<&str>, mode: SendMode) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.quote(&wire::part(channels, reason), mode).await
    }

    /// PRIVMSG, one per line of `text`.
    pub async fn say(&self, dest: &str, text: &str, mode: SendMode) -> Result<()> {
        self.quote(&wire::privmsg(dest, text), mode).await
    }

    /// CTCP ACTION (`/me`), one per line of `text`.
    pub async fn act(&self, dest: &str, text: &str, mode: SendMode) -> Result<()> {
        self.quote(&wire::action(dest, text), mode).await
    }

    /// Query modes of `target`, or change them when `new_mode` is given.
    pub async fn set_mode(&self, target: &str, new_mode: Option<&str>, mode: SendMode) -> Result<()> {
        self.quote(&wire::mode(target, new_mode), mode).await
    }

    pub async fn kick(
        &self,
        channel: &str,
        target: &str,
        reason: Option<&str>,
        mode: SendMode,
    ) -> Result<()> {
        self.quote(&wire::kick(channel, target, reason), mode).await
    }

    /// Mark away with `state`, or come back when `None`.
    pub async fn set_away(&self, state: Option<&str>, mode: SendMode) -> Result<()> {
        self.quote(&wire::away(state), mode).await
    }

    pub async fn invite(&self, target: &str, channel: &str, mode: SendMode) -> Result<()> {
        self.quote(&wire::invite(target, channel), mode).await
    }

    pub async fn notice(&self, dest: &str, text: Option<&str>, mode: SendMode) -> Result<()> {
        self.quote(&wire::notice(dest, text), mode).await
    }

    /// Query the topic of `channel`, or set it when `topic` is given.
    pub async fn set_topic(&self, channel: &str, topic: Option<&str>, mode: SendMode) -> Result<()> {
        self.quote(&wire::topic(channel, topic), mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::connection::ConnectionOptions;
    use crate::irc::event::{Destination, Event};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    async fn connected() -> (Connection, BufReader<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let conn = Connection::with_options(ConnectionOptions {
            timeout: Duration::from_secs(5),
            quit_grace: Duration::from_millis(10),
            ..ConnectionOptions::default()
        });
        let (connect, accept) = tokio::join!(conn.connect("127.0.0.1", port, false), listener.accept());
        connect.unwrap();
        (conn, BufReader::new(accept.unwrap().0))
    }

    async fn next(server: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        server.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn test_registration_sequence() {
        let (conn, mut server) = connected().await;
        conn.set_password("hunter2", SendMode::Buffered).await.unwrap();
        conn.set_nick("re lay\n", SendMode::Buffered).await.unwrap();
        conn.set_user("relay", None, SendMode::Buffered).await.unwrap();
        conn.join(["#a", "#b"], None, SendMode::Buffered).await.unwrap();
        conn.flush().await.unwrap();

        assert_eq!(next(&mut server).await, "PASS hunter2\r\n");
        assert_eq!(next(&mut server).await, "NICK relay\r\n");
        assert_eq!(next(&mut server).await, "USER relay relay 127.0.0.1 :relay\r\n");
        assert_eq!(next(&mut server).await, "JOIN #a,#b\r\n");
        assert_eq!(conn.nick().await.as_deref(), Some("relay"));
    }

    #[tokio::test]
    async fn test_every_verb_is_crlf_terminated() {
        let (conn, mut server) = connected().await;
        let dirty = "x\r\ny";
        conn.part([dirty], Some(dirty), SendMode::Immediate).await.unwrap();
        conn.say("#c", dirty, SendMode::Immediate).await.unwrap();
        conn.act("#c", "waves", SendMode::Immediate).await.unwrap();
        conn.set_mode("#c", Some("+m"), SendMode::Immediate).await.unwrap();
        conn.kick("#c", "bob", Some(dirty), SendMode::Immediate).await.unwrap();
        conn.set_away(Some("brb"), SendMode::Immediate).await.unwrap();
        conn.invite("bob", "#c", SendMode::Immediate).await.unwrap();
        conn.notice("bob", None, SendMode::Immediate).await.unwrap();
        conn.set_topic("#c", Some(dirty), SendMode::Immediate).await.unwrap();

        let expected = [
            "PART xy :x y\r\n",
            "PRIVMSG #c :x\r\n",
            "PRIVMSG #c :y\r\n",
            "PRIVMSG #c :\x01ACTION waves\x01\r\n",
            "MODE #c +m\r\n",
            "KICK #c bob :x y\r\n",
            "AWAY :brb\r\n",
            "INVITE bob #c\r\n",
            "NOTICE bob\r\n",
            "TOPIC #c :x y\r\n",
        ];
        for want in expected {
            assert_eq!(next(&mut server).await, want);
        }
    }

    #[tokio::test]
    async fn test_say_round_trips_through_parser() {
        let (conn, mut server) = connected().await;
        conn.say("#chan", "hello", SendMode::Immediate).await.unwrap();
        let sent = next(&mut server).await;
        let echoed = format!(":nick!ident@host {}", sent.trim_end());

        let event = Event::parse(&echoed);
        assert_eq!(event.command(), Some("PRIVMSG"));
        assert_eq!(event.destination, Some(Destination::Target("#chan".into())));
        assert_eq!(event.message.as_deref(), Some("hello"));
    }
}
