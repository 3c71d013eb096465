//! Text formatting for relayed messages.
//!
//! - `pattern`: `{$name}` template substitution
//! - `markup`: Discord markdown <-> IRC control codes
//! - `colors`: stable nickname colours on the IRC side

pub mod colors;
pub mod markup;
pub mod pattern;

pub use colors::colorize_nick;
pub use markup::{discord_to_irc, irc_to_discord};
pub use pattern::{substitute_pattern, PatternMapping};
