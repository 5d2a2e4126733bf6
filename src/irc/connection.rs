//! The IRC connection engine.
//!
//! A [`Connection`] is shared (behind an `Arc`) between one task polling for
//! inbound events and any number of tasks issuing commands. The write half
//! and the outbound buffer sit behind the send lock, the read half and the
//! inbound buffer behind the receive lock, so reading and writing never wait
//! on each other.
//!
//! Locks are only ever taken in the order receive → send. `disconnect` takes
//! the send lock alone and wakes any reader blocked on the old stream through
//! the session watch channel.

use crate::irc::error::{IrcError, Result};
use crate::irc::event::Event;
use crate::irc::transport::{self, BoxedStream, LineBuffer, DEFAULT_READ_CHUNK};
use crate::irc::wire;
use futures::FutureExt;
use std::borrow::Cow;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};

pub const DEFAULT_PORT: u16 = 6667;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Time given to the server to process QUIT before the stream is closed.
pub const DEFAULT_QUIT_GRACE: Duration = Duration::from_secs(2);

/// Whether a command is written now or appended to the outbound buffer until
/// the next [`Connection::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    #[default]
    Immediate,
    Buffered,
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Bound on connect, handshake, every write and every blocking read.
    pub timeout: Duration,
    pub quit_grace: Duration,
    pub read_chunk: usize,
    pub accept_invalid_certs: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            quit_grace: DEFAULT_QUIT_GRACE,
            read_chunk: DEFAULT_READ_CHUNK,
            accept_invalid_certs: false,
        }
    }
}

struct SendSide {
    writer: Option<WriteHalf<BoxedStream>>,
    buffer: Vec<u8>,
    addr: Option<(String, u16)>,
    nick: Option<String>,
}

struct RecvSide {
    reader: Option<ReadHalf<BoxedStream>>,
    /// Session the reader belongs to.
    session: u64,
    buffer: LineBuffer,
}

pub struct Connection {
    options: ConnectionOptions,
    send_side: Mutex<SendSide>,
    recv_side: Mutex<RecvSide>,
    /// `Some(id)` while session `id` is live, `None` once it is torn down.
    session: watch::Sender<Option<u64>>,
    next_session: AtomicU64,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self::with_options(ConnectionOptions::default())
    }

    pub fn with_options(options: ConnectionOptions) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            options,
            send_side: Mutex::new(SendSide {
                writer: None,
                buffer: Vec::new(),
                addr: None,
                nick: None,
            }),
            recv_side: Mutex::new(RecvSide {
                reader: None,
                session: 0,
                buffer: LineBuffer::new(),
            }),
            session,
            next_session: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// True while a stream is established.
    pub fn is_connected(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// The nick last sent with [`Connection::set_nick`].
    pub async fn nick(&self) -> Option<String> {
        self.send_side.lock().await.nick.clone()
    }

    pub(crate) async fn remember_nick(&self, nick: String) {
        self.send_side.lock().await.nick = Some(nick);
    }

    pub async fn address(&self) -> Option<(String, u16)> {
        self.send_side.lock().await.addr.clone()
    }

    /// Connect to `host:port`, over TLS when `use_tls` is set.
    ///
    /// A previous session, if any, is closed without QUIT. Nick and both
    /// buffers start out empty. Retry policy belongs to the caller.
    pub async fn connect(&self, host: &str, port: u16, use_tls: bool) -> Result<()> {
        let host = wire::squash(host);
        let stream = transport::open(
            &host,
            port,
            use_tls,
            self.options.accept_invalid_certs,
            self.options.timeout,
        )
        .await?;
        let (reader, writer) = tokio::io::split(stream);
        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;

        // Wake a reader blocked on the previous session so it drops the
        // receive lock.
        self.session.send_replace(None);
        let mut recv = self.recv_side.lock().await;
        let mut send = self.send_side.lock().await;

        if let Some(mut old) = send.writer.take() {
            let _ = tokio::time::timeout(self.options.quit_grace, old.shutdown()).await;
        }
        send.writer = Some(writer);
        send.buffer.clear();
        send.addr = Some((host.clone(), port));
        send.nick = None;
        recv.reader = Some(reader);
        recv.session = id;
        recv.buffer.clear();
        self.session.send_replace(Some(id));

        tracing::info!(host = %host, port, tls = use_tls, session = id, "IRC connected");
        Ok(())
    }

    /// Write `data` immediately, or flush the outbound buffer when `None`.
    ///
    /// A failed write closes the stream before the error is returned.
    pub async fn send(&self, data: Option<&[u8]>) -> Result<()> {
        let mut side = self.send_side.lock().await;
        self.send_locked(&mut side, data).await
    }

    /// Flush the outbound buffer.
    pub async fn flush(&self) -> Result<()> {
        self.send(None).await
    }

    /// Number of bytes waiting in the outbound buffer.
    pub async fn pending(&self) -> usize {
        self.send_side.lock().await.buffer.len()
    }

    /// Send raw command text. Multiple commands are separated by newlines;
    /// each is CRLF-terminated and blank lines are dropped.
    pub async fn quote(&self, raw: &str, mode: SendMode) -> Result<()> {
        let bytes = wire::frame(raw);
        if bytes.is_empty() {
            return Ok(());
        }
        match mode {
            SendMode::Immediate => self.send(Some(&bytes)).await,
            SendMode::Buffered => {
                self.send_side.lock().await.buffer.extend_from_slice(&bytes);
                Ok(())
            }
        }
    }

    async fn send_locked(&self, side: &mut SendSide, data: Option<&[u8]>) -> Result<()> {
        if side.writer.is_none() {
            return Err(IrcError::NotConnected);
        }
        let bytes: Cow<'_, [u8]> = match data {
            Some(data) => Cow::Borrowed(data),
            None => Cow::Owned(std::mem::take(&mut side.buffer)),
        };
        if bytes.is_empty() {
            return Ok(());
        }
        let Some(writer) = side.writer.as_mut() else {
            return Err(IrcError::NotConnected);
        };

        let write = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        };
        let err = match tokio::time::timeout(self.options.timeout, write).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => IrcError::Transport(e),
            Err(_) => IrcError::Timeout(self.options.timeout),
        };

        tracing::warn!(error = %err, "IRC write failed, closing connection");
        side.writer = None;
        self.session.send_replace(None);
        Err(err)
    }

    /// Read one chunk into the inbound buffer.
    ///
    /// Returns `Ok(false)` when `blocking` is off and nothing is ready (or
    /// another task holds the receive lock). A closed peer tears the session
    /// down and returns `Ok(true)`; the next call fails with
    /// [`IrcError::NotConnected`].
    pub async fn receive(&self, blocking: bool) -> Result<bool> {
        let mut side = if blocking {
            self.recv_side.lock().await
        } else {
            match self.recv_side.try_lock() {
                Ok(side) => side,
                Err(_) => return Ok(false),
            }
        };
        self.receive_locked(&mut side, blocking).await
    }

    async fn receive_locked(&self, side: &mut RecvSide, blocking: bool) -> Result<bool> {
        let live = *self.session.borrow();
        let id = match live {
            Some(id) if id == side.session && side.reader.is_some() => id,
            _ => {
                side.reader = None;
                return Err(IrcError::NotConnected);
            }
        };
        let Some(reader) = side.reader.as_mut() else {
            return Err(IrcError::NotConnected);
        };

        let mut chunk = vec![0u8; self.options.read_chunk.max(1)];
        let ended = session_ended(self.session.subscribe(), id);
        let read = async {
            tokio::select! {
                res = reader.read(&mut chunk) => Some(res),
                _ = ended => None,
            }
        };

        let outcome = if blocking {
            match tokio::time::timeout(self.options.timeout, read).await {
                Ok(outcome) => outcome,
                Err(_) => Some(Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))),
            }
        } else {
            match read.now_or_never() {
                Some(outcome) => outcome,
                None => return Ok(false),
            }
        };

        match outcome {
            None => {
                side.reader = None;
                Err(IrcError::NotConnected)
            }
            Some(Ok(0)) => {
                side.reader = None;
                self.teardown(id, "Connection reset by peer.").await;
                Ok(true)
            }
            Some(Ok(n)) => {
                side.buffer.extend(&chunk[..n]);
                Ok(true)
            }
            Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Some(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
                side.reader = None;
                self.teardown(id, "Operation timed out.").await;
                Err(IrcError::Timeout(self.options.timeout))
            }
            Some(Err(e)) => {
                side.reader = None;
                self.teardown(id, "Network error.").await;
                Err(IrcError::Transport(e))
            }
        }
    }

    /// Next complete line from the server, without its CRLF.
    ///
    /// Non-blocking calls return `Ok(None)` when no complete line is
    /// buffered and nothing more is ready.
    pub async fn recv_line(&self, blocking: bool) -> Result<Option<String>> {
        let mut side = if blocking {
            self.recv_side.lock().await
        } else {
            match self.recv_side.try_lock() {
                Ok(side) => side,
                Err(_) => return Ok(None),
            }
        };
        loop {
            if let Some(line) = side.buffer.next_line() {
                return Ok(Some(line));
            }
            if !self.receive_locked(&mut side, blocking).await? {
                return Ok(None);
            }
        }
    }

    /// Receive the next line and parse it, answering keepalives on the way.
    pub async fn parse_next_event(&self, blocking: bool) -> Result<Option<Event>> {
        match self.recv_line(blocking).await? {
            Some(line) => Ok(Some(self.handle_line(&line).await)),
            None => Ok(None),
        }
    }

    /// Parse a line obtained from [`Connection::recv_line`].
    ///
    /// `PING` is answered with `PONG` and a CTCP PING with a NOTICE echo
    /// before the event is returned. Failures to send either reply are
    /// logged, never returned.
    pub async fn handle_line(&self, line: &str) -> Event {
        let event = Event::parse(line);
        if let Some(rest) = line.strip_prefix("PING ") {
            if let Err(e) = self.quote(&wire::pong(rest), SendMode::Immediate).await {
                tracing::warn!(error = %e, "failed to answer PING");
            }
        } else if let Some(nick) = event.ctcp_ping_sender() {
            if let Err(e) = self.notice(nick, event.message.as_deref(), SendMode::Immediate).await {
                tracing::warn!(error = %e, %nick, "failed to answer CTCP PING");
            }
        }
        event
    }

    /// Send QUIT, wait the grace period and close the stream.
    ///
    /// With `wait` the QUIT is queued behind any buffered commands and the
    /// whole buffer flushed; otherwise it is written directly. Delivery is
    /// best effort. Address, nick and outbound buffer are cleared either way.
    pub async fn disconnect(&self, reason: Option<&str>, wait: bool) {
        let mut side = self.send_side.lock().await;
        self.disconnect_locked(&mut side, reason, wait).await;
    }

    async fn disconnect_locked(&self, side: &mut SendSide, reason: Option<&str>, wait: bool) {
        if side.writer.is_some() {
            let quit = wire::frame(&wire::quit(reason));
            let sent = if wait {
                side.buffer.extend_from_slice(&quit);
                self.send_locked(side, None).await
            } else {
                self.send_locked(side, Some(&quit)).await
            };
            if let Err(e) = sent {
                tracing::debug!(error = %e, "QUIT not delivered");
            }
            tokio::time::sleep(self.options.quit_grace).await;
            if let Some(mut writer) = side.writer.take() {
                let _ = tokio::time::timeout(self.options.quit_grace, writer.shutdown()).await;
            }
            tracing::info!(reason = reason.unwrap_or(""), "IRC disconnected");
        }
        side.writer = None;
        side.buffer.clear();
        side.addr = None;
        side.nick = None;
        self.session.send_replace(None);
    }

    /// Close session `id` from the read path, unless it was already replaced.
    async fn teardown(&self, id: u64, reason: &str) {
        let mut side = self.send_side.lock().await;
        if *self.session.borrow() != Some(id) {
            return;
        }
        tracing::warn!(reason, "IRC connection lost");
        self.disconnect_locked(&mut side, Some(reason), false).await;
    }
}

async fn session_ended(mut session: watch::Receiver<Option<u64>>, id: u64) {
    loop {
        if *session.borrow_and_update() != Some(id) {
            return;
        }
        if session.changed().await.is_err() {
            return;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let Some(mut writer) = self.send_side.get_mut().writer.take() else {
            return;
        };
        self.session.send_replace(None);
        let quit = wire::frame(&wire::quit(None));
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = writer.write_all(&quit).await;
                    let _ = writer.shutdown().await;
                });
            }
            Err(_) => tracing::debug!("connection dropped outside a runtime, closing without QUIT"),
        }
    }
}
