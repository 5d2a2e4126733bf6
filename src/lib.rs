//! crabrelay: an IRC connection engine for chat relays.
//!
//! The [`irc::Connection`] owns one server session and can be shared between
//! a task polling for [`irc::Event`]s and tasks sending commands.

pub mod config;
pub mod irc;
pub mod logging;
