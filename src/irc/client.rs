//! IRC connection task.
//!
//! The `irc` crate handles the wire: registration, PING replies, alternate
//! nicknames, autojoin and send throttling. This task owns reconnects,
//! feeds every server message through [`IrcSession`] and forwards router
//! commands once the session is registered.

use std::collections::HashMap;
use std::time::Duration;

use ::irc::client::prelude::{Client, Command, Config as ClientConfig, Message};
use backon::BackoffBuilder;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::bridge::channels::IrcChannels;
use crate::common::error::{IrcError, IrcResult};
use crate::common::messages::IrcEvent;
use crate::config::types::{Config, IrcOptions};

use super::session::IrcSession;

const QUIT_MESSAGE: &str = "Bridge shutting down";

/// Alternate nicknames tried when ours is taken (`nick1`, `nick2`, ...).
const ALT_NICK_COUNT: u32 = 5;

/// How long to keep reading after QUIT so it reaches the server.
const QUIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// Shutdown was requested; QUIT has been sent.
    Shutdown,
    /// The server closed the connection.
    Closed,
}

/// The IRC side of the bridge.
pub struct IrcClient {
    server: String,
    nickname: String,
    options: IrcOptions,
    /// Channels to join after registration, keys included.
    autojoin: Vec<String>,
    pub channels: IrcChannels,
    session: IrcSession,
}

impl IrcClient {
    pub fn new(config: &Config, autojoin: Vec<String>, channels: IrcChannels) -> Self {
        Self {
            server: config.server.clone(),
            nickname: config.nickname.clone(),
            options: config.irc_options.clone(),
            autojoin,
            channels,
            session: IrcSession::new(&config.nickname),
        }
    }

    /// Settings handed to the protocol client for each connection.
    pub fn client_config(&self) -> ClientConfig {
        let mut channels = Vec::new();
        let mut channel_keys = HashMap::new();
        for entry in &self.autojoin {
            let mut parts = entry.split_whitespace();
            let Some(channel) = parts.next() else {
                continue;
            };
            if let Some(key) = parts.next() {
                channel_keys.insert(channel.to_string(), key.to_string());
            }
            channels.push(channel.to_string());
        }

        let (burst_window_length, max_messages_in_burst) = throttle(&self.options);
        let or_nickname = |value: &Option<String>| {
            Some(value.clone().unwrap_or_else(|| self.nickname.clone()))
        };

        ClientConfig {
            nickname: Some(self.nickname.clone()),
            alt_nicks: (1..=ALT_NICK_COUNT)
                .map(|n| format!("{}{}", self.nickname, n))
                .collect(),
            username: or_nickname(&self.options.user_name),
            realname: or_nickname(&self.options.real_name),
            server: Some(self.server.clone()),
            port: Some(self.options.port),
            password: self.options.password.clone(),
            use_tls: Some(self.options.secure),
            channels,
            channel_keys,
            burst_window_length: Some(burst_window_length),
            max_messages_in_burst: Some(max_messages_in_burst),
            ..ClientConfig::default()
        }
    }

    /// Backoff between reconnect attempts, bounded by `retryCount`.
    fn reconnect_backoff(&self) -> impl Iterator<Item = Duration> {
        backon::ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.options.retry_delay))
            .with_max_delay(Duration::from_secs(300))
            .with_factor(1.5)
            .with_jitter()
            .with_max_times(self.options.retry_count as usize)
            .build()
    }

    /// Connect and keep reconnecting until shutdown or retries run out.
    pub async fn run(&mut self) -> IrcResult<()> {
        let mut backoff = self.reconnect_backoff();
        let mut attempts = 0u32;

        loop {
            info!(server = %self.server, port = self.options.port, "Connecting to IRC");

            match self.run_connection().await {
                Ok(ConnectionEnd::Shutdown) => return Ok(()),
                Ok(ConnectionEnd::Closed) => warn!("IRC connection closed"),
                Err(e) => error!("IRC connection error: {}", e),
            }

            if self.session.is_registered() {
                backoff = self.reconnect_backoff();
                attempts = 0;
            }
            self.session.reset(&self.nickname);

            let Some(delay) = backoff.next() else {
                return Err(IrcError::RetriesExhausted { attempts });
            };
            attempts += 1;
            info!(
                attempt = attempts,
                "Reconnecting to IRC in {:.1} seconds...",
                delay.as_secs_f64()
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = self.channels.shutdown_rx.changed() => {
                    if changed.is_err() || *self.channels.shutdown_rx.borrow() {
                        info!("Shutdown signal received during IRC backoff");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Drive one connection from registration until it ends.
    ///
    /// Router commands are only taken off the queue while registered, so
    /// anything sent during a reconnect waits for the next session.
    async fn run_connection(&mut self) -> IrcResult<ConnectionEnd> {
        self.session.reset(&self.nickname);

        let mut client = Client::from_config(self.client_config()).await?;
        client.identify()?;
        let mut stream = client.stream()?;

        loop {
            tokio::select! {
                item = stream.next() => {
                    if let Some(end) = self.on_stream_item(item) {
                        return Ok(end);
                    }
                }

                changed = self.channels.shutdown_rx.changed() => {
                    if changed.is_err() || *self.channels.shutdown_rx.borrow() {
                        info!("Disconnecting from IRC");
                        client.send(Command::QUIT(Some(QUIT_MESSAGE.to_string())))?;
                        // The stream drives outgoing messages; read until the server hangs up.
                        let drain = async { while stream.next().await.is_some() {} };
                        if tokio::time::timeout(QUIT_FLUSH_TIMEOUT, drain).await.is_err() {
                            debug!("IRC server did not close the connection after QUIT");
                        }
                        return Ok(ConnectionEnd::Shutdown);
                    }
                }

                Some(command) = self.channels.command_rx.recv(), if self.session.is_registered() => {
                    for message in self.session.outgoing(command) {
                        client.send(message)?;
                    }
                }
            }
        }
    }

    /// Feed one stream item through the session.
    ///
    /// Unreadable input is logged and skipped. Returns how the connection
    /// ended once the stream is exhausted.
    fn on_stream_item(
        &mut self,
        item: Option<Result<Message, ::irc::error::Error>>,
    ) -> Option<ConnectionEnd> {
        match item {
            Some(Ok(message)) => {
                for event in self.session.handle_message(&message) {
                    self.emit(event);
                }
                None
            }
            Some(Err(e)) => {
                warn!("Skipping unreadable IRC input: {}", e);
                None
            }
            None => Some(ConnectionEnd::Closed),
        }
    }

    fn emit(&self, event: IrcEvent) {
        if let Err(e) = self.channels.event_tx.send(event) {
            debug!("IRC event channel closed: {}", e);
        }
    }
}

/// Send throttling as (window in seconds, messages per window).
///
/// With flood protection on, roughly one message per
/// `floodProtectionDelay` milliseconds.
fn throttle(options: &IrcOptions) -> (u32, u32) {
    if !options.flood_protection {
        return (1, u32::MAX);
    }
    let delay = options.flood_protection_delay.max(1);
    let window_secs = delay.div_ceil(1000).max(1);
    let messages = (window_secs * 1000 / delay).max(1);
    (
        u32::try_from(window_secs).unwrap_or(u32::MAX),
        u32::try_from(messages).unwrap_or(u32::MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::bridge::channels::{ControlChannels, DiscordSideChannels};
    use crate::bridge::ChannelBundle;
    use crate::common::messages::IrcCommand;

    fn make_test_config() -> Config {
        let mut mapping = BTreeMap::new();
        mapping.insert("#general".to_string(), "#irc".to_string());

        Config {
            server: "irc.example.net".to_string(),
            nickname: "relay".to_string(),
            discord_token: "token".to_string(),
            channel_mapping: Some(mapping),
            ..Config::default()
        }
    }

    /// The parts of the bundle the test keeps alive.
    struct ChannelBundleRest {
        discord: DiscordSideChannels,
        _control: ControlChannels,
    }

    impl ChannelBundleRest {
        fn drain_events(&mut self) -> Vec<IrcEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.discord.irc_event_rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn make_client(config: &Config, autojoin: &[&str]) -> (IrcClient, ChannelBundleRest) {
        let bundle = ChannelBundle::new();
        let autojoin = autojoin.iter().map(|c| c.to_string()).collect();
        let client = IrcClient::new(config, autojoin, bundle.irc);
        (
            client,
            ChannelBundleRest {
                discord: bundle.discord,
                _control: bundle.control,
            },
        )
    }

    fn line(raw: &str) -> Option<Result<Message, ::irc::error::Error>> {
        Some(Ok(raw.parse().unwrap()))
    }

    #[test]
    fn test_client_config_from_bridge_config() {
        let mut config = make_test_config();
        config.irc_options.password = Some("secret".to_string());
        config.irc_options.real_name = Some("Discord relay".to_string());
        let (client, _rest) = make_client(&config, &["#irc", "#ops key"]);

        let client_config = client.client_config();
        assert_eq!(client_config.server.as_deref(), Some("irc.example.net"));
        assert_eq!(client_config.port, Some(6667));
        assert_eq!(client_config.nickname.as_deref(), Some("relay"));
        assert_eq!(client_config.alt_nicks[0], "relay1");
        assert_eq!(client_config.alt_nicks.len(), ALT_NICK_COUNT as usize);
        assert_eq!(client_config.username.as_deref(), Some("relay"));
        assert_eq!(client_config.realname.as_deref(), Some("Discord relay"));
        assert_eq!(client_config.password.as_deref(), Some("secret"));
        assert_eq!(client_config.use_tls, Some(false));
        assert_eq!(client_config.channels, vec!["#irc", "#ops"]);
        assert_eq!(
            client_config.channel_keys.get("#ops").map(String::as_str),
            Some("key")
        );
        assert!(!client_config.channel_keys.contains_key("#irc"));
    }

    #[test]
    fn test_throttle_follows_flood_protection() {
        let mut options = IrcOptions::default();
        assert_eq!(throttle(&options), (1, 2));

        options.flood_protection_delay = 1500;
        assert_eq!(throttle(&options), (2, 1));

        options.flood_protection = false;
        assert_eq!(throttle(&options), (1, u32::MAX));
    }

    #[test]
    fn test_unreadable_input_keeps_connection() {
        let (mut client, mut rest) = make_client(&make_test_config(), &["#irc"]);

        assert_eq!(client.on_stream_item(line(":irc.example.net 001 relay :Welcome")), None);
        assert_eq!(client.on_stream_item(line(":irc.example.net 376 relay :End of MOTD")), None);
        let unreadable = ::irc::error::Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad line",
        ));
        assert_eq!(client.on_stream_item(Some(Err(unreadable))), None);
        assert_eq!(
            client.on_stream_item(line(":carol!c@example.com PRIVMSG #irc :still here")),
            None
        );

        assert_eq!(
            rest.drain_events(),
            vec![
                IrcEvent::Registered {
                    nickname: "relay".to_string()
                },
                IrcEvent::Message {
                    author: "carol".to_string(),
                    target: "#irc".to_string(),
                    text: "still here".to_string(),
                },
            ]
        );
        assert_eq!(client.on_stream_item(None), Some(ConnectionEnd::Closed));
    }

    #[test]
    fn test_commands_wait_for_next_session() {
        let bundle = ChannelBundle::new();
        let command_tx = bundle.discord.irc_command_tx.clone();
        let mut client = IrcClient::new(&make_test_config(), Vec::new(), bundle.irc);

        let say = IrcCommand::Say {
            target: "#irc".to_string(),
            text: "queued while offline".to_string(),
        };
        tokio_test::assert_ok!(command_tx.send(say.clone()));

        assert_eq!(client.on_stream_item(None), Some(ConnectionEnd::Closed));
        client.session.reset("relay");
        assert!(!client.session.is_registered());
        assert_eq!(client.channels.command_rx.try_recv().ok(), Some(say));
    }
}
