//! Message routing between the two platforms.
//!
//! Pure functions of (event, bridge, directory): they decide what to send
//! and never touch a connection. Anything that cannot be routed is dropped
//! with a debug log.

use tracing::{debug, error, info};

use crate::common::messages::{DiscordMessage, DiscordSend, IrcCommand, IrcEvent, Outbound};
use crate::discord::resolver::{
    resolve_discord_references, resolve_irc_mentions, ChannelInfo, GuildDirectory,
};
use crate::format::{
    colorize_nick, discord_to_irc, irc_to_discord, substitute_pattern, PatternMapping,
};

use super::mapping::DiscordChannelKey;
use super::orchestrator::Bridge;

/// Translate a Discord message into IRC sends.
pub fn route_discord_message(
    bridge: &Bridge,
    message: &DiscordMessage,
    self_user_id: u64,
    directory: &dyn GuildDirectory,
) -> Vec<IrcCommand> {
    if message.author_id == self_user_id {
        return Vec::new();
    }

    let channel_name = message
        .channel_name
        .clone()
        .or_else(|| directory.channel(message.channel_id).map(|c| c.name))
        .unwrap_or_default();

    let Some(irc_channel) = bridge.mapping().resolve_outbound(
        message.channel_id,
        Some(channel_name.as_str()).filter(|name| !name.is_empty()),
    ) else {
        debug!(
            channel_id = message.channel_id,
            channel_name = %channel_name,
            "No IRC channel mapped for Discord channel"
        );
        return Vec::new();
    };

    let nickname = message.display_name();
    let display_username = if bridge.config().irc_nick_color {
        colorize_nick(nickname)
    } else {
        nickname.to_string()
    };
    let text = resolve_discord_references(message, directory);
    let discord_channel = if channel_name.is_empty() {
        message.channel_id.to_string()
    } else {
        format!("#{}", channel_name)
    };

    let mut mapping = PatternMapping::new()
        .with("nickname", nickname)
        .with("displayUsername", display_username)
        .with("text", text.as_str())
        .with("discordChannel", discord_channel)
        .with("ircChannel", irc_channel);

    let templates = bridge.templates();
    let say = |text: String| IrcCommand::Say {
        target: irc_channel.to_string(),
        text,
    };
    let mut sends = Vec::new();

    if bridge.is_command(&text) {
        sends.push(say(substitute_pattern(&templates.command_prelude, &mapping)));
        sends.push(say(text));
    } else if !text.is_empty() {
        mapping.set("text", discord_to_irc(&text));
        let line = substitute_pattern(&templates.irc_text, &mapping);
        debug!(irc_channel, text = %line, "Sending message to IRC");
        sends.push(say(line));
    }

    for url in &message.attachments {
        mapping.set("attachmentURL", url.as_str());
        sends.push(say(substitute_pattern(&templates.url_attachment, &mapping)));
    }

    sends
}

/// Translate an IRC session event into sends for either side.
///
/// `irc_nickname` is the nickname the session is currently registered with.
pub fn route_irc_event(
    bridge: &Bridge,
    event: &IrcEvent,
    irc_nickname: &str,
    directory: &dyn GuildDirectory,
) -> Vec<Outbound> {
    let config = bridge.config();
    let is_self = |nick: &str| nick.eq_ignore_ascii_case(irc_nickname);

    match event {
        IrcEvent::Registered { nickname } => {
            info!(nickname = %nickname, "Connected to IRC");
            config
                .auto_send_commands
                .iter()
                .map(|args| Outbound::Irc(IrcCommand::Raw { args: args.clone() }))
                .collect()
        }
        IrcEvent::Message {
            author,
            target,
            text,
        } => send_to_discord(bridge, author, target, text, directory),
        IrcEvent::Notice {
            author,
            target,
            text,
        } => send_to_discord(bridge, author, target, &format!("*{}*", text), directory),
        IrcEvent::Action {
            author,
            target,
            text,
        } => send_to_discord(bridge, author, target, &format!("_{}_", text), directory),
        IrcEvent::Join { channel, nick } => {
            if !config.irc_status_notices || (is_self(nick) && !config.announce_self_join) {
                return Vec::new();
            }
            send_exact_to_discord(
                bridge,
                channel,
                format!("*{}* has joined the channel", nick),
                directory,
            )
        }
        IrcEvent::Part {
            channel,
            nick,
            reason,
        } => {
            if !config.irc_status_notices || is_self(nick) {
                return Vec::new();
            }
            send_exact_to_discord(
                bridge,
                channel,
                format!("*{}* has left the channel ({})", nick, reason),
                directory,
            )
        }
        IrcEvent::Quit {
            nick,
            reason,
            channels,
        } => {
            if !config.irc_status_notices || is_self(nick) {
                return Vec::new();
            }
            channels
                .iter()
                .flat_map(|channel| {
                    send_exact_to_discord(
                        bridge,
                        channel,
                        format!("*{}* has quit ({})", nick, reason),
                        directory,
                    )
                })
                .collect()
        }
        IrcEvent::Invite { channel, from } => {
            debug!(channel = %channel, from = %from, "Received invite");
            match bridge.mapping().join_target(channel) {
                Some(target) => {
                    debug!(channel = %target, "Joining channel");
                    vec![Outbound::Irc(IrcCommand::Join {
                        channel: target.to_string(),
                    })]
                }
                None => {
                    debug!(channel = %channel, "Channel not found in config, not joining");
                    Vec::new()
                }
            }
        }
        IrcEvent::NickChanged { nickname } => {
            debug!(nickname = %nickname, "IRC nickname changed");
            Vec::new()
        }
        IrcEvent::Error { message } => {
            error!(message = %message, "Received error event from IRC");
            Vec::new()
        }
    }
}

/// The Discord channel an IRC channel maps to, if the bot can see it.
fn find_discord_channel(
    bridge: &Bridge,
    irc_channel: &str,
    directory: &dyn GuildDirectory,
) -> Option<ChannelInfo> {
    let key = bridge.mapping().resolve_inbound(irc_channel)?;
    let channel = match key {
        DiscordChannelKey::Name(name) => directory.text_channel_by_name(name),
        DiscordChannelKey::Id(id) => directory.channel(*id),
    };

    if channel.is_none() {
        info!(
            discord_channel = %key,
            "Tried to send a message to a channel the bot isn't in"
        );
    }
    channel
}

fn send_to_discord(
    bridge: &Bridge,
    author: &str,
    irc_channel: &str,
    text: &str,
    directory: &dyn GuildDirectory,
) -> Vec<Outbound> {
    let Some(channel) = find_discord_channel(bridge, irc_channel, directory) else {
        return Vec::new();
    };

    let with_format = irc_to_discord(text);
    let with_mentions = resolve_irc_mentions(&with_format, channel.guild_id, directory);

    let mapping = PatternMapping::new()
        .with("author", author)
        .with("text", with_format)
        .with("withMentions", with_mentions)
        .with("discordChannel", format!("#{}", channel.name))
        .with("ircChannel", irc_channel);

    let content = substitute_pattern(&bridge.templates().discord, &mapping);
    debug!(
        irc_channel,
        discord_channel = %channel.name,
        content = %content,
        "Sending message to Discord"
    );

    vec![Outbound::Discord(DiscordSend {
        channel_id: channel.id,
        content,
    })]
}

/// Post `text` to the mapped Discord channel without any template.
fn send_exact_to_discord(
    bridge: &Bridge,
    irc_channel: &str,
    text: String,
    directory: &dyn GuildDirectory,
) -> Vec<Outbound> {
    let Some(channel) = find_discord_channel(bridge, irc_channel, directory) else {
        return Vec::new();
    };

    debug!(
        irc_channel,
        discord_channel = %channel.name,
        text = %text,
        "Sending special message to Discord"
    );
    vec![Outbound::Discord(DiscordSend {
        channel_id: channel.id,
        content: text,
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::common::messages::MentionedUser;
    use crate::config::types::Config;
    use crate::discord::resolver::tests::FixtureDirectory;

    const BOT_ID: u64 = 1;
    const GENERAL: u64 = 100;
    const OPS: u64 = 200;

    fn make_valid_config() -> Config {
        let mut mapping = BTreeMap::new();
        mapping.insert("#general".to_string(), "#irc".to_string());
        mapping.insert(OPS.to_string(), "#Ops key".to_string());

        Config {
            server: "irc.example.net".to_string(),
            nickname: "relay".to_string(),
            discord_token: "token".to_string(),
            channel_mapping: Some(mapping),
            command_characters: vec!["!".to_string()],
            irc_nick_color: true,
            ..Config::default()
        }
    }

    fn make_bridge(edit: impl FnOnce(&mut Config)) -> Bridge {
        let mut config = make_valid_config();
        edit(&mut config);
        Bridge::new(config).unwrap()
    }

    fn make_directory() -> FixtureDirectory {
        FixtureDirectory::default()
            .with_channel(GENERAL, "general")
            .with_channel(OPS, "ops")
            .with_member(BOT_ID, "relay-bot", None)
            .with_member(10, "robert", Some("Bob"))
            .with_member(11, "alice", None)
    }

    fn make_message(author_id: u64, content: &str) -> DiscordMessage {
        DiscordMessage {
            author_id,
            author_name: "alice".to_string(),
            content: content.to_string(),
            channel_id: GENERAL,
            channel_name: Some("general".to_string()),
            guild_id: Some(1),
            ..Default::default()
        }
    }

    fn say(target: &str, text: &str) -> IrcCommand {
        IrcCommand::Say {
            target: target.to_string(),
            text: text.to_string(),
        }
    }

    fn discord(channel_id: u64, content: &str) -> Outbound {
        Outbound::Discord(DiscordSend {
            channel_id,
            content: content.to_string(),
        })
    }

    #[test]
    fn test_own_messages_are_ignored() {
        let bridge = make_bridge(|_| {});
        let message = make_message(BOT_ID, "echo");

        assert!(bridge
            .handle_discord_message(&message, BOT_ID, &make_directory())
            .is_empty());
    }

    #[test]
    fn test_unmapped_discord_channel_is_dropped() {
        let bridge = make_bridge(|_| {});
        let mut message = make_message(11, "hello");
        message.channel_id = 999;
        message.channel_name = Some("random".to_string());

        assert!(bridge
            .handle_discord_message(&message, BOT_ID, &make_directory())
            .is_empty());
    }

    #[test]
    fn test_chat_line_with_mention_and_bold() {
        let bridge = make_bridge(|c| c.irc_nick_color = false);
        let mut message = make_message(11, "**hi** <@10>");
        message.mentions.push(MentionedUser {
            id: 10,
            username: "robert".to_string(),
        });

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(sends, vec![say("#irc", "<alice> \x02hi\x02 @Bob")]);
    }

    #[test]
    fn test_author_nickname_is_colored() {
        let bridge = make_bridge(|_| {});
        let mut message = make_message(10, "hello");
        message.author_name = "robert".to_string();
        message.author_nickname = Some("Bob".to_string());

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(sends, vec![say("#irc", "<\x0308Bob\x0F> hello")]);
    }

    #[test]
    fn test_command_sends_prelude_then_raw_text() {
        let bridge = make_bridge(|c| c.irc_nick_color = false);
        let message = make_message(11, "!roll **d20**");

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(
            sends,
            vec![
                say("#irc", "Command sent from Discord by alice:"),
                say("#irc", "!roll **d20**"),
            ]
        );
    }

    #[test]
    fn test_attachment_follows_chat_line() {
        let bridge = make_bridge(|c| c.irc_nick_color = false);
        let mut message = make_message(11, "look");
        message.attachments.push("https://cdn.example/cat.png".to_string());

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(
            sends,
            vec![
                say("#irc", "<alice> look"),
                say("#irc", "<alice> https://cdn.example/cat.png"),
            ]
        );
    }

    #[test]
    fn test_command_with_attachment_sends_prelude_text_then_attachment() {
        let bridge = make_bridge(|c| c.irc_nick_color = false);
        let mut message = make_message(11, "!show **this**");
        message.attachments.push("https://cdn.example/cat.png".to_string());

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(
            sends,
            vec![
                say("#irc", "Command sent from Discord by alice:"),
                say("#irc", "!show **this**"),
                say("#irc", "<alice> https://cdn.example/cat.png"),
            ]
        );
    }

    #[test]
    fn test_unknown_channel_name_renders_channel_id() {
        let bridge = make_bridge(|c| c.format.irc_text = Some("[{$discordChannel}] {$text}".to_string()));
        let mut message = make_message(11, "hi");
        message.channel_id = OPS;
        message.channel_name = None;

        let sends = bridge.handle_discord_message(&message, BOT_ID, &FixtureDirectory::default());
        assert_eq!(sends, vec![say("#ops", "[200] hi")]);
    }

    #[test]
    fn test_attachment_only_message() {
        let bridge = make_bridge(|c| c.irc_nick_color = false);
        let mut message = make_message(11, "");
        message.attachments.push("https://cdn.example/a.png".to_string());
        message.attachments.push("https://cdn.example/b.png".to_string());

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(
            sends,
            vec![
                say("#irc", "<alice> https://cdn.example/a.png"),
                say("#irc", "<alice> https://cdn.example/b.png"),
            ]
        );
    }

    #[test]
    fn test_custom_irc_template() {
        let bridge = make_bridge(|c| {
            c.irc_nick_color = false;
            c.format.irc_text = Some("[{$discordChannel}->{$ircChannel}] {$nickname}: {$text}".to_string());
        });
        let message = make_message(11, "hey");

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(sends, vec![say("#irc", "[#general->#irc] alice: hey")]);
    }

    #[test]
    fn test_discord_channel_matched_by_id() {
        let bridge = make_bridge(|c| c.irc_nick_color = false);
        let mut message = make_message(11, "status?");
        message.channel_id = OPS;
        message.channel_name = Some("ops".to_string());

        let sends = bridge.handle_discord_message(&message, BOT_ID, &make_directory());
        assert_eq!(sends, vec![say("#ops", "<alice> status?")]);
    }

    #[test]
    fn test_irc_message_to_discord() {
        let bridge = make_bridge(|_| {});
        let event = IrcEvent::Message {
            author: "carol".to_string(),
            target: "#IRC".to_string(),
            text: "\x02hey\x02 @Bob".to_string(),
        };

        let sends = bridge.handle_irc_event(&event, "relay", &make_directory());
        assert_eq!(sends, vec![discord(GENERAL, "**<carol>** **hey** <@10>")]);
    }

    #[test]
    fn test_irc_notice_and_action_wrapping() {
        let bridge = make_bridge(|_| {});
        let directory = make_directory();

        let notice = IrcEvent::Notice {
            author: "srv".to_string(),
            target: "#irc".to_string(),
            text: "maintenance".to_string(),
        };
        let action = IrcEvent::Action {
            author: "carol".to_string(),
            target: "#ops".to_string(),
            text: "waves".to_string(),
        };

        assert_eq!(
            bridge.handle_irc_event(&notice, "relay", &directory),
            vec![discord(GENERAL, "**<srv>** *maintenance*")]
        );
        assert_eq!(
            bridge.handle_irc_event(&action, "relay", &directory),
            vec![discord(OPS, "**<carol>** _waves_")]
        );
    }

    #[test]
    fn test_private_and_unmapped_irc_messages_dropped() {
        let bridge = make_bridge(|_| {});
        let directory = make_directory();

        for target in ["relay", "#elsewhere"] {
            let event = IrcEvent::Message {
                author: "carol".to_string(),
                target: target.to_string(),
                text: "hi".to_string(),
            };
            assert!(bridge.handle_irc_event(&event, "relay", &directory).is_empty());
        }
    }

    #[test]
    fn test_missing_discord_channel_dropped() {
        let bridge = make_bridge(|_| {});
        let event = IrcEvent::Message {
            author: "carol".to_string(),
            target: "#irc".to_string(),
            text: "hi".to_string(),
        };

        assert!(bridge
            .handle_irc_event(&event, "relay", &FixtureDirectory::default())
            .is_empty());
    }

    #[test]
    fn test_voice_channel_with_same_name_not_used() {
        let bridge = make_bridge(|_| {});
        let directory = FixtureDirectory::default().with_voice_channel(300, "general");
        let event = IrcEvent::Message {
            author: "carol".to_string(),
            target: "#irc".to_string(),
            text: "hi".to_string(),
        };

        assert!(bridge.handle_irc_event(&event, "relay", &directory).is_empty());
    }

    #[test]
    fn test_status_notices_disabled_by_default() {
        let bridge = make_bridge(|_| {});
        let event = IrcEvent::Join {
            channel: "#irc".to_string(),
            nick: "carol".to_string(),
        };

        assert!(bridge
            .handle_irc_event(&event, "relay", &make_directory())
            .is_empty());
    }

    #[test]
    fn test_join_part_quit_notices() {
        let bridge = make_bridge(|c| c.irc_status_notices = true);
        let directory = make_directory();

        let join = IrcEvent::Join {
            channel: "#irc".to_string(),
            nick: "carol".to_string(),
        };
        let part = IrcEvent::Part {
            channel: "#irc".to_string(),
            nick: "carol".to_string(),
            reason: "bye".to_string(),
        };
        let quit = IrcEvent::Quit {
            nick: "carol".to_string(),
            reason: "Ping timeout".to_string(),
            channels: vec!["#irc".to_string(), "#ops".to_string(), "#unmapped".to_string()],
        };

        assert_eq!(
            bridge.handle_irc_event(&join, "relay", &directory),
            vec![discord(GENERAL, "*carol* has joined the channel")]
        );
        assert_eq!(
            bridge.handle_irc_event(&part, "relay", &directory),
            vec![discord(GENERAL, "*carol* has left the channel (bye)")]
        );
        assert_eq!(
            bridge.handle_irc_event(&quit, "relay", &directory),
            vec![
                discord(GENERAL, "*carol* has quit (Ping timeout)"),
                discord(OPS, "*carol* has quit (Ping timeout)"),
            ]
        );
    }

    #[test]
    fn test_status_lines_skip_templates_and_markup() {
        let bridge = make_bridge(|c| {
            c.irc_status_notices = true;
            c.format.discord = Some("IGNORED {$text}".to_string());
        });
        let join = IrcEvent::Join {
            channel: "#irc".to_string(),
            nick: "under_score".to_string(),
        };

        assert_eq!(
            bridge.handle_irc_event(&join, "relay", &make_directory()),
            vec![discord(GENERAL, "*under_score* has joined the channel")]
        );
    }

    #[test]
    fn test_self_join_announcement() {
        let directory = make_directory();
        let join = IrcEvent::Join {
            channel: "#irc".to_string(),
            nick: "relay".to_string(),
        };

        let quiet = make_bridge(|c| c.irc_status_notices = true);
        assert!(quiet.handle_irc_event(&join, "relay", &directory).is_empty());

        let loud = make_bridge(|c| {
            c.irc_status_notices = true;
            c.announce_self_join = true;
        });
        assert_eq!(
            loud.handle_irc_event(&join, "relay", &directory),
            vec![discord(GENERAL, "*relay* has joined the channel")]
        );
    }

    #[test]
    fn test_self_part_and_quit_never_announced() {
        let bridge = make_bridge(|c| {
            c.irc_status_notices = true;
            c.announce_self_join = true;
        });
        let directory = make_directory();

        let part = IrcEvent::Part {
            channel: "#irc".to_string(),
            nick: "relay_".to_string(),
            reason: String::new(),
        };
        let quit = IrcEvent::Quit {
            nick: "relay_".to_string(),
            reason: String::new(),
            channels: vec!["#irc".to_string()],
        };

        assert!(bridge.handle_irc_event(&part, "relay_", &directory).is_empty());
        assert!(bridge.handle_irc_event(&quit, "relay_", &directory).is_empty());
    }

    #[test]
    fn test_invite_to_mapped_channel_joins_with_key() {
        let bridge = make_bridge(|_| {});
        let event = IrcEvent::Invite {
            channel: "#ops".to_string(),
            from: "chanserv".to_string(),
        };

        assert_eq!(
            bridge.handle_irc_event(&event, "relay", &make_directory()),
            vec![Outbound::Irc(IrcCommand::Join {
                channel: "#Ops key".to_string(),
            })]
        );
    }

    #[test]
    fn test_invite_to_unmapped_channel_ignored() {
        let bridge = make_bridge(|_| {});
        let event = IrcEvent::Invite {
            channel: "#spam".to_string(),
            from: "someone".to_string(),
        };

        assert!(bridge
            .handle_irc_event(&event, "relay", &make_directory())
            .is_empty());
    }

    #[test]
    fn test_registered_sends_auto_commands_in_order() {
        let identify = vec!["PRIVMSG".to_string(), "NickServ".to_string(), "IDENTIFY pw".to_string()];
        let mode = vec!["MODE".to_string(), "relay".to_string(), "+x".to_string()];
        let bridge = make_bridge(|c| {
            c.auto_send_commands = vec![identify.clone(), mode.clone()];
        });
        let event = IrcEvent::Registered {
            nickname: "relay".to_string(),
        };

        assert_eq!(
            bridge.handle_irc_event(&event, "relay", &make_directory()),
            vec![
                Outbound::Irc(IrcCommand::Raw { args: identify }),
                Outbound::Irc(IrcCommand::Raw { args: mode }),
            ]
        );
    }

    #[test]
    fn test_nick_change_routes_nothing() {
        let bridge = make_bridge(|c| c.irc_status_notices = true);
        let event = IrcEvent::NickChanged {
            nickname: "relay_away".to_string(),
        };

        assert!(bridge
            .handle_irc_event(&event, "relay", &make_directory())
            .is_empty());
    }

    #[test]
    fn test_self_join_after_nick_change_stays_quiet() {
        let bridge = make_bridge(|c| c.irc_status_notices = true);
        let join = IrcEvent::Join {
            channel: "#irc".to_string(),
            nick: "relay_away".to_string(),
        };

        assert!(bridge
            .handle_irc_event(&join, "relay_away", &make_directory())
            .is_empty());
    }

    #[test]
    fn test_error_event_routes_nothing() {
        let bridge = make_bridge(|_| {});
        let event = IrcEvent::Error {
            message: "Closing Link".to_string(),
        };

        assert!(bridge
            .handle_irc_event(&event, "relay", &make_directory())
            .is_empty());
    }
}
