//! Canonical message types for bridge communication.
//!
//! Both sessions translate their wire events into these types before the
//! router sees them, and the router answers with outbound commands.

/// A user referenced by a Discord message's mention list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionedUser {
    pub id: u64,
    /// Global username.
    pub username: String,
}

/// Snapshot of a Discord message, taken from the gateway event.
#[derive(Debug, Clone, Default)]
pub struct DiscordMessage {
    /// Author's user id.
    pub author_id: u64,
    /// Author's global username.
    pub author_name: String,
    /// Author's per-guild nickname, if one is set.
    pub author_nickname: Option<String>,
    /// Raw message content, mention markers included.
    pub content: String,
    /// Channel the message was posted in.
    pub channel_id: u64,
    /// Channel name without `#`, when known.
    pub channel_name: Option<String>,
    /// Guild the channel belongs to (None for direct messages).
    pub guild_id: Option<u64>,
    /// Users mentioned by the message.
    pub mentions: Vec<MentionedUser>,
    /// Attachment URLs, in posting order.
    pub attachments: Vec<String>,
}

impl DiscordMessage {
    /// Name shown for the author: guild nickname, else username.
    pub fn display_name(&self) -> &str {
        self.author_nickname.as_deref().unwrap_or(&self.author_name)
    }
}

/// Events delivered by the IRC session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    /// Registration finished and autojoin was sent.
    Registered { nickname: String },
    /// Our own nickname changed after registration.
    NickChanged { nickname: String },
    /// PRIVMSG to a channel or to us.
    Message {
        author: String,
        target: String,
        text: String,
    },
    /// NOTICE to a channel or to us.
    Notice {
        author: String,
        target: String,
        text: String,
    },
    /// CTCP ACTION (`/me`).
    Action {
        author: String,
        target: String,
        text: String,
    },
    Join {
        channel: String,
        nick: String,
    },
    Part {
        channel: String,
        nick: String,
        reason: String,
    },
    /// QUIT, with every channel the user was known to be in.
    Quit {
        nick: String,
        reason: String,
        channels: Vec<String>,
    },
    Invite {
        channel: String,
        from: String,
    },
    /// ERROR line or another fatal server reply.
    Error { message: String },
}

/// Commands sent to the IRC session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcCommand {
    /// PRIVMSG to a channel or nick.
    Say { target: String, text: String },
    /// JOIN a channel (a trailing key is allowed: `#chan key`).
    Join { channel: String },
    /// Arbitrary command, last argument sent as the trailing parameter.
    Raw { args: Vec<String> },
}

/// A message to post in a Discord channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordSend {
    pub channel_id: u64,
    pub content: String,
}

/// Anything the router asks a session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Irc(IrcCommand),
    Discord(DiscordSend),
}
