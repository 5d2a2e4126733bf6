//! Error taxonomy for the connection engine.
//!
//! Every transport failure tears the stream down before it is returned, so a
//! caller that receives an [`IrcError`] always finds the [`Connection`] in the
//! disconnected state and only has to decide whether to reconnect.
//!
//! Parse failures are not represented here: malformed server input degrades
//! to a fallback [`Event`] instead.
//!
//! [`Connection`]: crate::irc::connection::Connection
//! [`Event`]: crate::irc::event::Event

use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrcError {
    /// The TCP connect or the TLS handshake failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A read or write failed mid-session.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// The configured operation timeout elapsed.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// There is no live stream: never connected, disconnected, or torn down.
    #[error("socket operation on non-socket")]
    NotConnected,

    /// The host cannot be used as a TLS server name.
    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),
}

impl IrcError {
    /// True for errors that mean the connection is gone and must be
    /// re-established.
    pub fn is_disconnect(&self) -> bool {
        !matches!(self, IrcError::InvalidServerName(_))
    }
}

pub type Result<T> = std::result::Result<T, IrcError>;
