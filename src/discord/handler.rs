//! Discord event handling.
//!
//! Turns gateway events into router calls and carries out the resulting
//! sends: IRC commands go to the session queue, Discord posts are awaited
//! in order.

use serenity::cache::Cache;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::Guild;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bridge::SharedBridge;
use crate::common::messages::{
    DiscordMessage, DiscordSend, IrcCommand, IrcEvent, MentionedUser, Outbound,
};
use crate::discord::resolver::{CacheDirectory, EmptyDirectory, GuildDirectory};

/// Discord-side state of the bridge.
pub struct BridgeHandler {
    bridge: SharedBridge,
    irc_command_tx: mpsc::UnboundedSender<IrcCommand>,
    /// Our own Discord user, once Ready arrived.
    self_user_id: Option<u64>,
    /// Gateway context while connected.
    context: Option<Context>,
    /// Nickname the IRC session registered with.
    irc_nickname: String,
}

impl BridgeHandler {
    pub fn new(bridge: SharedBridge, irc_command_tx: mpsc::UnboundedSender<IrcCommand>) -> Self {
        let irc_nickname = bridge.config().nickname.clone();
        Self {
            bridge,
            irc_command_tx,
            self_user_id: None,
            context: None,
            irc_nickname,
        }
    }

    pub fn handle_ready(&mut self, context: Context, ready: Ready) {
        info!("Connected to Discord as {}", ready.user.name);
        self.self_user_id = Some(ready.user.id.get());
        self.context = Some(context);
    }

    pub fn handle_guild_create(&mut self, context: Context, guild: &Guild) {
        info!(
            "Received guild data for '{}' ({} channels)",
            guild.name,
            guild.channels.len()
        );

        let mapped: Vec<String> = guild
            .channels
            .values()
            .filter(|channel| {
                self.bridge
                    .mapping()
                    .resolve_outbound(channel.id.get(), Some(channel.name.as_str()))
                    .is_some()
            })
            .map(|channel| format!("#{} ({})", channel.name, channel.id))
            .collect();
        info!("Bridged channels in '{}': {:?}", guild.name, mapped);

        self.context = Some(context);
    }

    pub fn handle_disconnected(&mut self) {
        warn!("Discord connection lost");
        self.context = None;
    }

    /// Route a Discord message to IRC.
    pub fn handle_message(&mut self, context: &Context, message: &Message) {
        let self_user_id = self
            .self_user_id
            .unwrap_or_else(|| context.cache.current_user().id.get());

        let snapshot = snapshot_message(&context.cache, message);
        let directory = CacheDirectory::new(&context.cache);
        let commands = self
            .bridge
            .handle_discord_message(&snapshot, self_user_id, &directory);

        for command in commands {
            self.send_to_irc(command);
        }
    }

    /// Route an IRC event and perform the resulting sends.
    pub async fn handle_irc_event(&mut self, event: IrcEvent) {
        if let Some(nickname) = own_nickname(&event) {
            self.irc_nickname = nickname.to_string();
        }

        let outbound = match &self.context {
            Some(context) => {
                let directory = CacheDirectory::new(&context.cache);
                self.route_irc_event(&event, &directory)
            }
            None => self.route_irc_event(&event, &EmptyDirectory),
        };

        let (irc, discord) = split_outbound(outbound);
        for command in irc {
            self.send_to_irc(command);
        }

        if discord.is_empty() {
            return;
        }
        let Some(context) = &self.context else {
            debug!("Dropping {} Discord sends - Discord not connected", discord.len());
            return;
        };
        for send in discord {
            if let Err(e) = ChannelId::new(send.channel_id)
                .say(&context.http, &send.content)
                .await
            {
                error!("Failed to send to Discord channel {}: {}", send.channel_id, e);
            }
        }
    }

    fn route_irc_event(&self, event: &IrcEvent, directory: &dyn GuildDirectory) -> Vec<Outbound> {
        self.bridge
            .handle_irc_event(event, &self.irc_nickname, directory)
    }

    fn send_to_irc(&self, command: IrcCommand) {
        if let Err(e) = self.irc_command_tx.send(command) {
            error!("Failed to send command to IRC: {}", e);
        }
    }
}

/// Copy what routing needs out of a serenity message.
pub fn snapshot_message(cache: &Cache, message: &Message) -> DiscordMessage {
    let guild = message.guild_id.and_then(|guild_id| cache.guild(guild_id));

    let author_nickname = message
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .or_else(|| {
            guild
                .as_ref()
                .and_then(|guild| guild.members.get(&message.author.id))
                .and_then(|member| member.nick.clone())
        });
    let channel_name = guild
        .as_ref()
        .and_then(|guild| guild.channels.get(&message.channel_id))
        .map(|channel| channel.name.clone());

    DiscordMessage {
        author_id: message.author.id.get(),
        author_name: message.author.name.clone(),
        author_nickname,
        content: message.content.clone(),
        channel_id: message.channel_id.get(),
        channel_name,
        guild_id: message.guild_id.map(|id| id.get()),
        mentions: message
            .mentions
            .iter()
            .map(|user| MentionedUser {
                id: user.id.get(),
                username: user.name.clone(),
            })
            .collect(),
        attachments: message
            .attachments
            .iter()
            .map(|attachment| attachment.url.clone())
            .collect(),
    }
}

/// Our IRC nickname, when the event announces it.
fn own_nickname(event: &IrcEvent) -> Option<&str> {
    match event {
        IrcEvent::Registered { nickname } | IrcEvent::NickChanged { nickname } => {
            Some(nickname.as_str())
        }
        _ => None,
    }
}

/// Separate router output by platform, keeping order within each.
pub fn split_outbound(outbound: Vec<Outbound>) -> (Vec<IrcCommand>, Vec<DiscordSend>) {
    let mut irc = Vec::new();
    let mut discord = Vec::new();
    for item in outbound {
        match item {
            Outbound::Irc(command) => irc.push(command),
            Outbound::Discord(send) => discord.push(send),
        }
    }
    (irc, discord)
}
