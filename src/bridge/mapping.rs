//! Static channel mapping between Discord and IRC.
//!
//! Built once from configuration; both directions are plain hash lookups.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::common::error::ConfigError;

/// How a Discord channel is named in the mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiscordChannelKey {
    /// Channel id (key was all digits).
    Id(u64),
    /// Text channel name, without the leading `#`.
    Name(String),
}

impl DiscordChannelKey {
    /// Parse a mapping key: digits are an id, `#name` is a name.
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if let Some(name) = key.strip_prefix('#') {
            if name.is_empty() {
                return None;
            }
            return Some(Self::Name(name.to_string()));
        }
        key.parse::<u64>().ok().map(Self::Id)
    }
}

impl fmt::Display for DiscordChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "#{}", name),
        }
    }
}

/// Normalize an IRC channel for lookups: drop any key, lowercase.
pub fn normalize_irc_channel(channel: &str) -> String {
    channel
        .split(' ')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Bidirectional Discord <-> IRC channel table.
#[derive(Debug, Clone)]
pub struct ChannelMapping {
    /// Discord key -> normalized IRC channel.
    outbound: HashMap<DiscordChannelKey, String>,
    /// Normalized IRC channel -> Discord key.
    inbound: HashMap<String, DiscordChannelKey>,
    /// IRC channels as configured (keys included), for JOIN.
    join_list: Vec<String>,
}

impl ChannelMapping {
    /// Build the table from the configured `channelMapping` object.
    ///
    /// Two Discord channels mapped onto the same IRC channel make the reverse
    /// direction ambiguous and are rejected.
    pub fn from_config(mapping: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut outbound = HashMap::new();
        let mut inbound: HashMap<String, DiscordChannelKey> = HashMap::new();
        let mut join_list = Vec::new();
        let mut errors = Vec::new();

        for (discord, irc) in mapping {
            let Some(key) = DiscordChannelKey::parse(discord) else {
                errors.push(format!("'{}' is not a Discord channel id or #name", discord));
                continue;
            };
            let irc_channel = normalize_irc_channel(irc);

            if let Some(existing) = inbound.get(&irc_channel) {
                errors.push(format!(
                    "IRC channel {} is mapped from both {} and {}",
                    irc_channel, existing, key
                ));
                continue;
            }

            inbound.insert(irc_channel.clone(), key.clone());
            outbound.insert(key, irc_channel);
            join_list.push(irc.trim().to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::InvalidChannelMapping {
                message: errors.join("; "),
            });
        }

        Ok(Self {
            outbound,
            inbound,
            join_list,
        })
    }

    /// IRC channel for a Discord channel, by id first and `#name` second.
    pub fn resolve_outbound(&self, channel_id: u64, channel_name: Option<&str>) -> Option<&str> {
        self.outbound
            .get(&DiscordChannelKey::Id(channel_id))
            .or_else(|| {
                channel_name.and_then(|name| {
                    self.outbound
                        .get(&DiscordChannelKey::Name(name.trim_start_matches('#').to_string()))
                })
            })
            .map(String::as_str)
    }

    /// Discord channel key for an IRC channel (case-insensitive).
    pub fn resolve_inbound(&self, irc_channel: &str) -> Option<&DiscordChannelKey> {
        self.inbound.get(&normalize_irc_channel(irc_channel))
    }

    /// IRC channels to join, with their keys.
    pub fn irc_channels_to_join(&self) -> &[String] {
        &self.join_list
    }

    /// The configured JOIN target (key included) for a mapped IRC channel.
    pub fn join_target(&self, irc_channel: &str) -> Option<&str> {
        let wanted = normalize_irc_channel(irc_channel);
        self.join_list
            .iter()
            .find(|entry| normalize_irc_channel(entry) == wanted)
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }
}
