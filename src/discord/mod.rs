//! Discord bot integration.
//!
//! This module provides the Discord side of the bridge: the serenity
//! client, event handling and mention resolution.

pub mod client;
pub mod handler;
pub mod resolver;

pub use client::{DiscordBotBuilder, DiscordChannels};
