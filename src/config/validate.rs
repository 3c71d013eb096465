//! Configuration validation.
//!
//! Runs before any connection is attempted; every failure here is fatal.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Characters an IRC channel name may start with.
const IRC_CHANNEL_PREFIXES: [char; 4] = ['#', '&', '+', '!'];

/// Validate a configuration and return detailed errors.
///
/// Required fields are checked first, in declaration order, and the first
/// missing one is reported on its own. Remaining problems are collected.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    check_required_fields(config)?;

    if let Some(ref mapping) = config.channel_mapping {
        validate_channel_mapping(mapping)?;
    }

    let mut errors = Vec::new();

    if config.server.contains(char::is_whitespace) {
        errors.push(format!("server '{}' must not contain whitespace", config.server));
    }
    if config.nickname.contains(char::is_whitespace) {
        errors.push(format!("nickname '{}' must not contain whitespace", config.nickname));
    }
    if config.irc_options.port == 0 {
        errors.push("ircOptions.port must be non-zero".to_string());
    }
    for (i, prefix) in config.command_characters.iter().enumerate() {
        if prefix.is_empty() {
            errors.push(format!("commandCharacters[{}] is empty", i));
        }
    }
    for (i, command) in config.auto_send_commands.iter().enumerate() {
        if command.is_empty() || command[0].trim().is_empty() {
            errors.push(format!("autoSendCommands[{}] has no command name", i));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

/// Report the first required field that is absent or empty.
fn check_required_fields(config: &Config) -> Result<(), ConfigError> {
    let missing = if config.server.is_empty() {
        Some("server")
    } else if config.nickname.is_empty() {
        Some("nickname")
    } else if config.channel_mapping.is_none() {
        Some("channelMapping")
    } else if config.discord_token.is_empty() {
        Some("discordToken")
    } else {
        None
    };

    match missing {
        Some(field) => Err(ConfigError::MissingField {
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}

/// Structural checks on the channel mapping table.
pub fn validate_channel_mapping(
    mapping: &std::collections::BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    if mapping.is_empty() {
        return Err(ConfigError::InvalidChannelMapping {
            message: "no channels configured".to_string(),
        });
    }

    let mut errors = Vec::new();
    for (discord, irc) in mapping {
        let discord = discord.trim();
        if discord.is_empty() || discord == "#" {
            errors.push("empty Discord channel key".to_string());
        } else if !discord.starts_with('#') && !discord.chars().all(|c| c.is_ascii_digit()) {
            errors.push(format!(
                "Discord channel '{}' must be a channel id or start with '#'",
                discord
            ));
        }

        let irc_channel = irc.split(' ').next().unwrap_or_default();
        if irc_channel.len() < 2 || !irc_channel.starts_with(IRC_CHANNEL_PREFIXES) {
            errors.push(format!(
                "IRC channel '{}' for Discord channel '{}' is not a channel name",
                irc, discord
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::InvalidChannelMapping {
            message: errors.join("; "),
        })
    }
}
