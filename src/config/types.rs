//! Configuration type definitions.
//!
//! Keys are camelCase to stay compatible with existing bridge config files.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Default template for the line sent before a relayed command.
pub const DEFAULT_COMMAND_PRELUDE: &str = "Command sent from Discord by {$nickname}:";

/// Default template for Discord -> IRC chat lines.
pub const DEFAULT_IRC_TEXT: &str = "<{$displayUsername}> {$text}";

/// Default template for Discord -> IRC attachment lines.
pub const DEFAULT_URL_ATTACHMENT: &str = "<{$displayUsername}> {$attachmentURL}";

/// Default template for IRC -> Discord chat lines.
pub const DEFAULT_DISCORD_TEXT: &str = "**<{$author}>** {$withMentions}";

/// Root configuration structure.
///
/// Required fields deserialize to empty/None when absent so that validation
/// can report them by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub discord_token: String,
    /// Discord channel key (id or `#name`) -> IRC channel (optionally `#chan key`).
    #[serde(default)]
    pub channel_mapping: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub irc_options: IrcOptions,
    #[serde(default)]
    pub command_characters: Vec<String>,
    #[serde(default = "default_true")]
    pub irc_nick_color: bool,
    #[serde(default)]
    pub irc_status_notices: bool,
    #[serde(default)]
    pub announce_self_join: bool,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub auto_send_commands: Vec<Vec<String>>,
}

/// IRC connection options.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IrcOptions {
    pub port: u16,
    /// Server password (PASS).
    pub password: Option<String>,
    /// Connect over TLS.
    pub secure: bool,
    /// USER name, defaults to the nickname.
    pub user_name: Option<String>,
    /// Real name, defaults to the nickname.
    pub real_name: Option<String>,
    pub flood_protection: bool,
    /// Milliseconds between queued sends when flood protection is on.
    pub flood_protection_delay: u64,
    /// Reconnect attempts before giving up.
    pub retry_count: u32,
    /// Milliseconds before the first reconnect attempt.
    pub retry_delay: u64,
}

impl Default for IrcOptions {
    fn default() -> Self {
        Self {
            port: 6667,
            password: None,
            secure: false,
            user_name: None,
            real_name: None,
            flood_protection: true,
            flood_protection_delay: 500,
            retry_count: 10,
            retry_delay: 2000,
        }
    }
}

/// Custom message templates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConfig {
    pub command_prelude: Option<String>,
    pub irc_text: Option<String>,
    pub url_attachment: Option<String>,
    pub discord: Option<String>,
}

/// Templates with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub command_prelude: String,
    pub irc_text: String,
    pub url_attachment: String,
    pub discord: String,
}

impl From<&FormatConfig> for Templates {
    fn from(format: &FormatConfig) -> Self {
        Self {
            command_prelude: format
                .command_prelude
                .clone()
                .unwrap_or_else(|| DEFAULT_COMMAND_PRELUDE.to_string()),
            irc_text: format
                .irc_text
                .clone()
                .unwrap_or_else(|| DEFAULT_IRC_TEXT.to_string()),
            url_attachment: format
                .url_attachment
                .clone()
                .unwrap_or_else(|| DEFAULT_URL_ATTACHMENT.to_string()),
            discord: format
                .discord
                .clone()
                .unwrap_or_else(|| DEFAULT_DISCORD_TEXT.to_string()),
        }
    }
}

fn default_true() -> bool {
    true
}
