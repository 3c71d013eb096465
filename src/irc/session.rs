//! Per-connection IRC bookkeeping.
//!
//! The `irc` crate speaks the protocol. This side turns its messages into
//! [`IrcEvent`]s and remembers what the router needs to know: the nickname
//! we hold and who is in which channel, so a QUIT can be reported for every
//! channel the user left.

use std::collections::{HashMap, HashSet};

use ::irc::proto::{Command, Message, Response};
use tracing::{debug, info};

use crate::common::messages::{IrcCommand, IrcEvent};

/// Maximum length of a line on the wire, terminator included.
const MAX_LINE_BYTES: usize = 512;

/// Room left for the `:nick!user@host ` prefix the server adds when relaying.
const PREFIX_ALLOWANCE: usize = 64;

/// Nickname prefixes in NAMES replies.
const MEMBER_MODE_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];

#[derive(Debug, Default)]
pub struct IrcSession {
    /// Nickname the server knows us by.
    nickname: String,
    registered: bool,
    /// Lowercased channel -> lowercased nicks present.
    members: HashMap<String, HashSet<String>>,
}

impl IrcSession {
    pub fn new(nickname: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            ..Self::default()
        }
    }

    /// Forget everything learned on the previous connection.
    pub fn reset(&mut self, nickname: &str) {
        self.nickname = nickname.to_string();
        self.registered = false;
        self.members.clear();
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Whether the server finished registration and autojoin was sent.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    fn is_self(&self, nick: &str) -> bool {
        nick.eq_ignore_ascii_case(&self.nickname)
    }

    /// Translate one server message, updating membership on the way.
    pub fn handle_message(&mut self, message: &Message) -> Vec<IrcEvent> {
        let nick = message.source_nickname().unwrap_or_default().to_string();

        match &message.command {
            Command::Response(Response::RPL_WELCOME, args) => {
                if let Some(name) = args.first().filter(|name| !name.is_empty()) {
                    self.nickname = name.clone();
                }
                Vec::new()
            }
            // The client joins its channels once the MOTD is over.
            Command::Response(Response::RPL_ENDOFMOTD | Response::ERR_NOMOTD, _)
                if !self.registered =>
            {
                self.registered = true;
                info!(nick = %self.nickname, "Registered with IRC server");
                vec![IrcEvent::Registered {
                    nickname: self.nickname.clone(),
                }]
            }
            Command::Response(Response::RPL_NAMREPLY, args) => {
                self.on_names(args);
                Vec::new()
            }
            Command::Response(response, args) => {
                error_reply(*response as u16, args).into_iter().collect()
            }
            Command::PRIVMSG(target, text) => self.on_privmsg(nick, target, text),
            Command::NOTICE(target, text) => {
                if is_ctcp(text) {
                    debug!(from = %nick, "Ignoring CTCP reply");
                    return Vec::new();
                }
                vec![IrcEvent::Notice {
                    author: nick,
                    target: target.clone(),
                    text: text.clone(),
                }]
            }
            Command::JOIN(channels, _, _) => channels
                .split(',')
                .filter(|channel| !channel.is_empty())
                .map(|channel| {
                    self.members
                        .entry(channel.to_lowercase())
                        .or_default()
                        .insert(nick.to_lowercase());
                    IrcEvent::Join {
                        channel: channel.to_string(),
                        nick: nick.clone(),
                    }
                })
                .collect(),
            Command::PART(channels, reason) => channels
                .split(',')
                .filter(|channel| !channel.is_empty())
                .map(|channel| {
                    self.remove_member(channel, &nick);
                    IrcEvent::Part {
                        channel: channel.to_string(),
                        nick: nick.clone(),
                        reason: reason.clone().unwrap_or_default(),
                    }
                })
                .collect(),
            Command::KICK(channels, users, _) => {
                for channel in channels.split(',') {
                    for user in users.split(',') {
                        self.remove_member(channel, user);
                    }
                }
                Vec::new()
            }
            Command::QUIT(reason) => {
                let key = nick.to_lowercase();
                let mut channels: Vec<String> = self
                    .members
                    .iter_mut()
                    .filter_map(|(channel, nicks)| nicks.remove(&key).then(|| channel.clone()))
                    .collect();
                channels.sort();

                vec![IrcEvent::Quit {
                    nick,
                    reason: reason.clone().unwrap_or_default(),
                    channels,
                }]
            }
            Command::NICK(new_nick) => self.on_nick(&nick, new_nick),
            Command::INVITE(_, channel) => vec![IrcEvent::Invite {
                channel: channel.clone(),
                from: nick,
            }],
            Command::ERROR(message) => vec![IrcEvent::Error {
                message: message.clone(),
            }],
            Command::Raw(code, args) => match code.parse::<u16>() {
                Ok(code) => error_reply(code, args).into_iter().collect(),
                Err(_) => {
                    debug!(command = %code, "Unhandled IRC message");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        }
    }

    /// Protocol commands for a router command, long text split into lines.
    pub fn outgoing(&self, command: IrcCommand) -> Vec<Command> {
        match command {
            IrcCommand::Say { target, text } => {
                let overhead = "PRIVMSG  :\r\n".len()
                    + target.len()
                    + self.nickname.len()
                    + PREFIX_ALLOWANCE;
                let max_bytes = MAX_LINE_BYTES.saturating_sub(overhead);

                split_message(&text, max_bytes)
                    .into_iter()
                    .map(|chunk| Command::PRIVMSG(target.clone(), chunk))
                    .collect()
            }
            IrcCommand::Join { channel } => {
                let mut parts = channel.split_whitespace();
                match parts.next() {
                    Some(name) => vec![Command::JOIN(
                        name.to_string(),
                        parts.next().map(str::to_string),
                        None,
                    )],
                    None => Vec::new(),
                }
            }
            IrcCommand::Raw { args } => {
                let mut args = args.into_iter();
                match args.next() {
                    Some(command) => vec![Command::Raw(command, args.collect())],
                    None => Vec::new(),
                }
            }
        }
    }

    fn on_names(&mut self, args: &[String]) {
        // 353 <me> <type> <channel> :<names>
        let (Some(channel), Some(names)) = (args.get(2), args.get(3)) else {
            return;
        };
        let nicks = self.members.entry(channel.to_lowercase()).or_default();
        for name in names.split_whitespace() {
            let name = name.trim_start_matches(MEMBER_MODE_PREFIXES);
            if !name.is_empty() {
                nicks.insert(name.to_lowercase());
            }
        }
    }

    fn on_privmsg(&self, author: String, target: &str, text: &str) -> Vec<IrcEvent> {
        if !is_ctcp(text) {
            return vec![IrcEvent::Message {
                author,
                target: target.to_string(),
                text: text.to_string(),
            }];
        }

        let body = text.trim_matches('\x01');
        let action = match body.split_once(' ') {
            Some(("ACTION", action)) => action,
            _ if body == "ACTION" => "",
            _ => {
                debug!(from = %author, ctcp = %body, "Ignoring CTCP request");
                return Vec::new();
            }
        };
        vec![IrcEvent::Action {
            author,
            target: target.to_string(),
            text: action.to_string(),
        }]
    }

    fn on_nick(&mut self, old_nick: &str, new_nick: &str) -> Vec<IrcEvent> {
        let (old_key, new_key) = (old_nick.to_lowercase(), new_nick.to_lowercase());
        for nicks in self.members.values_mut() {
            if nicks.remove(&old_key) {
                nicks.insert(new_key.clone());
            }
        }

        if !self.is_self(old_nick) {
            return Vec::new();
        }
        info!(nick = %new_nick, "IRC nickname changed");
        self.nickname = new_nick.to_string();
        vec![IrcEvent::NickChanged {
            nickname: new_nick.to_string(),
        }]
    }

    fn remove_member(&mut self, channel: &str, nick: &str) {
        let channel = channel.to_lowercase();
        if self.is_self(nick) {
            self.members.remove(&channel);
        } else if let Some(nicks) = self.members.get_mut(&channel) {
            nicks.remove(&nick.to_lowercase());
        }
    }
}

/// Error event for a 4xx/5xx numeric.
fn error_reply(code: u16, args: &[String]) -> Option<IrcEvent> {
    (400..600).contains(&code).then(|| IrcEvent::Error {
        message: format!("{} {}", code, args.join(" ")),
    })
}

fn is_ctcp(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('\x01')
}

/// Split `text` into chunks of at most `max_bytes`, preferring whitespace.
///
/// Line breaks always split. Empty input yields no chunks.
pub fn split_message(text: &str, max_bytes: usize) -> Vec<String> {
    let max_bytes = max_bytes.max(1);
    let mut chunks = Vec::new();

    for line in text.split(['\r', '\n']) {
        let mut rest = line;
        while rest.len() > max_bytes {
            let mut end = max_bytes;
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                // A single character wider than the limit.
                end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
            }

            let cut = match rest[..end].rfind(' ') {
                Some(space) if space > 0 => space,
                _ => end,
            };
            chunks.push(rest[..cut].to_string());
            rest = rest[cut..].strip_prefix(' ').unwrap_or(&rest[cut..]);
        }
        if !rest.is_empty() {
            chunks.push(rest.to_string());
        }
    }

    chunks
}
