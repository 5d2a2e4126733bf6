//! IRC protocol layer: transport, command formatting, event parsing and the
//! relay-side client session.

pub mod client;
pub mod commands;
pub mod connection;
pub mod error;
pub mod event;
pub mod transport;
mod verbs;
pub mod wire;

pub use client::IrcClient;
pub use connection::{Connection, ConnectionOptions, SendMode};
pub use error::IrcError;
pub use event::{Destination, Event};
