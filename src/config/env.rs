//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `DISCORD_IRC_CONFIG` - Path of the config file
//! - `DISCORD_IRC_DISCORD_TOKEN` - Discord bot token
//! - `DISCORD_IRC_SERVER` - IRC server host
//! - `DISCORD_IRC_NICKNAME` - IRC nickname

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "DISCORD_IRC";

/// Apply environment variable overrides to a config.
///
/// Lets the token live outside the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        if !token.is_empty() {
            config.discord_token = token;
        }
    }
    if let Ok(server) = env::var(format!("{}_SERVER", ENV_PREFIX)) {
        if !server.is_empty() {
            config.server = server;
        }
    }
    if let Ok(nickname) = env::var(format!("{}_NICKNAME", ENV_PREFIX)) {
        if !nickname.is_empty() {
            config.nickname = nickname;
        }
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `DISCORD_IRC_CONFIG`, otherwise returns "config.json".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "config.json".to_string())
}
