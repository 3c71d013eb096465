//! Mention and reference resolution between Discord and IRC.
//!
//! Discord → IRC turns `<@id>`, `<@&id>`, `<#id>` and custom emoji markers
//! into readable text. IRC → Discord turns `@name` into real mentions.
//! Both directions look names up through [`GuildDirectory`].

use serenity::cache::Cache;
use serenity::model::channel::ChannelType;
use serenity::model::id::{ChannelId, RoleId, UserId};

use crate::common::messages::DiscordMessage;

/// A guild channel as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    pub name: String,
    pub guild_id: u64,
}

/// Read access to guild members, roles and channels.
pub trait GuildDirectory: Send + Sync {
    /// Any guild channel by id.
    fn channel(&self, channel_id: u64) -> Option<ChannelInfo>;

    /// A text channel by name (without `#`).
    fn text_channel_by_name(&self, name: &str) -> Option<ChannelInfo>;

    /// Nickname of a member, falling back to their username.
    fn member_display_name(&self, guild_id: u64, user_id: u64) -> Option<String>;

    fn role_name(&self, guild_id: u64, role_id: u64) -> Option<String>;

    /// User id of the member with this exact guild nickname.
    fn find_by_nickname(&self, guild_id: u64, nickname: &str) -> Option<u64>;

    /// User id of any known user with this exact username.
    fn find_by_username(&self, username: &str) -> Option<u64>;

    /// Role id of a mentionable role with this exact name.
    fn find_role_by_name(&self, guild_id: u64, name: &str) -> Option<u64>;
}

/// Directory used before the Discord cache is available: knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDirectory;

impl GuildDirectory for EmptyDirectory {
    fn channel(&self, _channel_id: u64) -> Option<ChannelInfo> {
        None
    }

    fn text_channel_by_name(&self, _name: &str) -> Option<ChannelInfo> {
        None
    }

    fn member_display_name(&self, _guild_id: u64, _user_id: u64) -> Option<String> {
        None
    }

    fn role_name(&self, _guild_id: u64, _role_id: u64) -> Option<String> {
        None
    }

    fn find_by_nickname(&self, _guild_id: u64, _nickname: &str) -> Option<u64> {
        None
    }

    fn find_by_username(&self, _username: &str) -> Option<u64> {
        None
    }

    fn find_role_by_name(&self, _guild_id: u64, _name: &str) -> Option<u64> {
        None
    }
}

/// [`GuildDirectory`] over serenity's gateway cache.
pub struct CacheDirectory<'a> {
    cache: &'a Cache,
}

impl<'a> CacheDirectory<'a> {
    pub fn new(cache: &'a Cache) -> Self {
        Self { cache }
    }
}

impl GuildDirectory for CacheDirectory<'_> {
    fn channel(&self, channel_id: u64) -> Option<ChannelInfo> {
        for guild_id in self.cache.guilds() {
            if let Some(guild) = self.cache.guild(guild_id) {
                if let Some(channel) = guild.channels.get(&ChannelId::new(channel_id)) {
                    return Some(ChannelInfo {
                        id: channel_id,
                        name: channel.name.clone(),
                        guild_id: guild_id.get(),
                    });
                }
            }
        }
        None
    }

    fn text_channel_by_name(&self, name: &str) -> Option<ChannelInfo> {
        for guild_id in self.cache.guilds() {
            if let Some(guild) = self.cache.guild(guild_id) {
                let found = guild
                    .channels
                    .values()
                    .find(|c| c.kind == ChannelType::Text && c.name == name);
                if let Some(channel) = found {
                    return Some(ChannelInfo {
                        id: channel.id.get(),
                        name: channel.name.clone(),
                        guild_id: guild_id.get(),
                    });
                }
            }
        }
        None
    }

    fn member_display_name(&self, guild_id: u64, user_id: u64) -> Option<String> {
        let guild = self.cache.guild(guild_id)?;
        let member = guild.members.get(&UserId::new(user_id))?;
        Some(member.nick.clone().unwrap_or_else(|| member.user.name.clone()))
    }

    fn role_name(&self, guild_id: u64, role_id: u64) -> Option<String> {
        let guild = self.cache.guild(guild_id)?;
        guild.roles.get(&RoleId::new(role_id)).map(|role| role.name.clone())
    }

    fn find_by_nickname(&self, guild_id: u64, nickname: &str) -> Option<u64> {
        let guild = self.cache.guild(guild_id)?;
        guild
            .members
            .iter()
            .find(|(_, member)| member.nick.as_deref() == Some(nickname))
            .map(|(id, _)| id.get())
    }

    fn find_by_username(&self, username: &str) -> Option<u64> {
        for guild_id in self.cache.guilds() {
            if let Some(guild) = self.cache.guild(guild_id) {
                let found = guild
                    .members
                    .iter()
                    .find(|(_, member)| member.user.name == username);
                if let Some((id, _)) = found {
                    return Some(id.get());
                }
            }
        }
        None
    }

    fn find_role_by_name(&self, guild_id: u64, name: &str) -> Option<u64> {
        let guild = self.cache.guild(guild_id)?;
        guild
            .roles
            .iter()
            .find(|(_, role)| role.name == name && role.mentionable)
            .map(|(id, _)| id.get())
    }
}

/// A `<...>` reference found in Discord message content.
#[derive(Debug, PartialEq, Eq)]
enum Reference<'a> {
    User(u64),
    Role(u64),
    Channel(u64),
    Emoji(&'a str),
}

/// Parse the inside of a `<...>` marker.
fn parse_reference(inner: &str) -> Option<Reference<'_>> {
    fn id(digits: &str) -> Option<u64> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // serenity ids are non-zero
        digits.parse().ok().filter(|&id| id != 0)
    }

    if let Some(rest) = inner.strip_prefix("@&") {
        return id(rest).map(Reference::Role);
    }
    if let Some(rest) = inner.strip_prefix("@!") {
        return id(rest).map(Reference::User);
    }
    if let Some(rest) = inner.strip_prefix('@') {
        return id(rest).map(Reference::User);
    }
    if let Some(rest) = inner.strip_prefix('#') {
        return id(rest).map(Reference::Channel);
    }

    let emoji = inner.strip_prefix("a:").or_else(|| inner.strip_prefix(':'))?;
    let (name, emoji_id) = emoji.split_once(':')?;
    if name.is_empty() || !name.chars().all(is_word_char) {
        return None;
    }
    id(emoji_id).map(|_| Reference::Emoji(name))
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Display name for a mentioned user, or None to leave the marker alone.
fn user_display_name(
    user_id: u64,
    message: &DiscordMessage,
    directory: &dyn GuildDirectory,
) -> Option<String> {
    let from_guild = message
        .guild_id
        .and_then(|guild_id| directory.member_display_name(guild_id, user_id));

    match message.mentions.iter().find(|user| user.id == user_id) {
        Some(user) => Some(from_guild.unwrap_or_else(|| user.username.clone())),
        None => from_guild,
    }
}

/// Make Discord message content readable on IRC.
///
/// Line breaks become single spaces. Unresolved user mentions stay literal;
/// unknown roles and channels become `@deleted-role` / `#deleted-channel`.
pub fn resolve_discord_references(message: &DiscordMessage, directory: &dyn GuildDirectory) -> String {
    let text = &message.content;
    let mut result = String::with_capacity(text.len());
    let mut rest = text.as_str();

    while let Some(pos) = rest.find(['<', '\r', '\n']) {
        result.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("\r\n") {
            result.push(' ');
            rest = after;
            continue;
        }
        if tail.starts_with(['\r', '\n']) {
            result.push(' ');
            rest = &tail[1..];
            continue;
        }

        // tail starts with '<'
        let reference = tail[1..]
            .find(['>', '<', ' '])
            .filter(|&end| tail[1 + end..].starts_with('>'))
            .and_then(|end| parse_reference(&tail[1..1 + end]).map(|r| (r, end + 2)));

        let Some((reference, consumed)) = reference else {
            result.push('<');
            rest = &tail[1..];
            continue;
        };

        match reference {
            Reference::User(user_id) => match user_display_name(user_id, message, directory) {
                Some(name) => {
                    result.push('@');
                    result.push_str(&name);
                }
                None => result.push_str(&tail[..consumed]),
            },
            Reference::Role(role_id) => {
                let name = message
                    .guild_id
                    .and_then(|guild_id| directory.role_name(guild_id, role_id));
                result.push('@');
                result.push_str(name.as_deref().unwrap_or("deleted-role"));
            }
            Reference::Channel(channel_id) => {
                let name = directory.channel(channel_id).map(|c| c.name);
                result.push('#');
                result.push_str(name.as_deref().unwrap_or("deleted-channel"));
            }
            Reference::Emoji(name) => {
                result.push(':');
                result.push_str(name);
                result.push(':');
            }
        }
        rest = &tail[consumed..];
    }

    result.push_str(rest);
    result
}

/// Turn `@name` tokens in IRC text into Discord mentions.
///
/// A token is the non-whitespace run after `@`, trimmed back to its last
/// word character. Lookup order: guild nickname, username, mentionable role.
/// Matching is exact and case-sensitive; misses stay as typed.
pub fn resolve_irc_mentions(text: &str, guild_id: u64, directory: &dyn GuildDirectory) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('@') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let run_len = after.find(char::is_whitespace).unwrap_or(after.len());
        let run = &after[..run_len];
        let token = run.trim_end_matches(|c: char| !is_word_char(c));

        if token.is_empty() {
            result.push('@');
            rest = after;
            continue;
        }

        let mention = directory
            .find_by_nickname(guild_id, token)
            .or_else(|| directory.find_by_username(token))
            .map(|user_id| format!("<@{}>", user_id))
            .or_else(|| {
                directory
                    .find_role_by_name(guild_id, token)
                    .map(|role_id| format!("<@&{}>", role_id))
            });

        match mention {
            Some(mention) => result.push_str(&mention),
            None => {
                result.push('@');
                result.push_str(token);
            }
        }
        rest = &after[token.len()..];
    }

    result.push_str(rest);
    result
}
