//! IRC side of the bridge.
//!
//! - `client`: connection task on top of the `irc` crate, reconnects
//! - `session`: event mapping, membership and nickname tracking

pub mod client;
pub mod session;

pub use client::IrcClient;
