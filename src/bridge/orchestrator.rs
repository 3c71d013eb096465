//! Bridge orchestrator: validated configuration plus the channel table.
//!
//! A `Bridge` is built once at startup and shared read-only between the
//! Discord dispatch loop and the IRC session.

use std::sync::Arc;

use tracing::info;

use crate::common::error::ConfigError;
use crate::common::messages::{DiscordMessage, IrcCommand, IrcEvent, Outbound};
use crate::config::types::{Config, Templates};
use crate::config::validate_config;
use crate::discord::resolver::GuildDirectory;

use super::mapping::ChannelMapping;
use super::router;

/// The immutable bridge state.
#[derive(Debug, Clone)]
pub struct Bridge {
    config: Config,
    mapping: ChannelMapping,
    templates: Templates,
}

/// Bridge shared between tasks.
pub type SharedBridge = Arc<Bridge>;

impl Bridge {
    /// Validate `config` and build the channel table.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        validate_config(&config)?;

        let mapping = match &config.channel_mapping {
            Some(mapping) => ChannelMapping::from_config(mapping)?,
            None => {
                return Err(ConfigError::MissingField {
                    field: "channelMapping".to_string(),
                })
            }
        };
        let templates = Templates::from(&config.format);

        info!(
            channels = mapping.len(),
            server = %config.server,
            nickname = %config.nickname,
            "Bridge configured"
        );

        Ok(Self {
            config,
            mapping,
            templates,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mapping(&self) -> &ChannelMapping {
        &self.mapping
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// IRC channels to join on connect, keys included.
    pub fn irc_channels(&self) -> Vec<String> {
        self.mapping.irc_channels_to_join().to_vec()
    }

    /// Whether `text` starts with one of the configured command prefixes.
    pub fn is_command(&self, text: &str) -> bool {
        self.config
            .command_characters
            .iter()
            .any(|prefix| !prefix.is_empty() && text.starts_with(prefix.as_str()))
    }

    /// Route a Discord message to IRC.
    pub fn handle_discord_message(
        &self,
        message: &DiscordMessage,
        self_user_id: u64,
        directory: &dyn GuildDirectory,
    ) -> Vec<IrcCommand> {
        router::route_discord_message(self, message, self_user_id, directory)
    }

    /// Route an IRC session event.
    pub fn handle_irc_event(
        &self,
        event: &IrcEvent,
        irc_nickname: &str,
        directory: &dyn GuildDirectory,
    ) -> Vec<Outbound> {
        router::route_irc_event(self, event, irc_nickname, directory)
    }
}
