//! Discord bot client abstraction.
//!
//! Serenity callbacks are forwarded into a queue and consumed by one
//! dispatch loop that also receives the IRC session's events.

use std::time::Duration;

use backon::BackoffBuilder;
use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::model::gateway::Ready;
use serenity::model::guild::Guild;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::bridge::SharedBridge;
use crate::common::messages::{IrcCommand, IrcEvent};
use crate::discord::handler::BridgeHandler;

#[derive(Debug, Clone)]
pub enum DiscordBotEvent {
    /// Bot connected and ready.
    Ready { context: Context, ready: Ready },
    /// Guild data received.
    GuildCreate { context: Context, guild: Guild },
    /// Message received.
    Message {
        context: Context,
        message: serenity::model::channel::Message,
    },
    Disconnected,
}

struct DiscordBotEvents {
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
}

impl DiscordBotEvents {
    fn new(discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>) -> Self {
        Self { discord_events_tx }
    }

    fn forward(&self, event: DiscordBotEvent) {
        if let Err(error) = self.discord_events_tx.send(event) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, context: Context, ready: Ready) {
        self.forward(DiscordBotEvent::Ready { context, ready });
    }

    async fn guild_create(&self, context: Context, guild: Guild, _is_new: Option<bool>) {
        self.forward(DiscordBotEvent::GuildCreate { context, guild });
    }

    async fn message(&self, context: Context, message: serenity::model::channel::Message) {
        self.forward(DiscordBotEvent::Message { context, message });
    }
}

/// Channels for Discord bot communication.
pub struct DiscordChannels {
    /// Sender for commands to the IRC session.
    pub irc_command_tx: mpsc::UnboundedSender<IrcCommand>,
    /// Receiver for IRC session events.
    pub irc_event_rx: mpsc::UnboundedReceiver<IrcEvent>,
    /// Receiver for shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Builder for creating the Discord bot.
pub struct DiscordBotBuilder {
    token: String,
    bridge: SharedBridge,
    channels: DiscordChannels,
}

impl DiscordBotBuilder {
    pub fn new(token: String, bridge: SharedBridge, channels: DiscordChannels) -> Self {
        Self {
            token,
            bridge,
            channels,
        }
    }

    /// Build the Discord bot.
    pub async fn build(self) -> anyhow::Result<DiscordBot> {
        info!(
            "Configured {} channel mappings",
            self.bridge.mapping().len()
        );

        let (discord_events_tx, discord_events_rx) = mpsc::unbounded_channel::<DiscordBotEvent>();
        let client = build_client(&self.token, discord_events_tx.clone()).await?;
        let handler = BridgeHandler::new(self.bridge, self.channels.irc_command_tx);

        Ok(DiscordBot {
            client: Some(client),
            token: self.token,
            handler,
            discord_events_rx,
            discord_events_tx,
            irc_event_rx: self.channels.irc_event_rx,
            shutdown_rx: self.channels.shutdown_rx,
        })
    }
}

async fn build_client(
    token: &str,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS;

    // Build a custom reqwest client with timeout settings
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let events = DiscordBotEvents::new(discord_events_tx);
    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

pub struct DiscordBot {
    client: Option<Client>,
    token: String,
    handler: BridgeHandler,
    discord_events_rx: mpsc::UnboundedReceiver<DiscordBotEvent>,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
    irc_event_rx: mpsc::UnboundedReceiver<IrcEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBot {
    pub async fn run(mut self) {
        let shard_manager = self.client.as_ref().map(|c| c.shard_manager.clone());
        let client = &mut self.client;
        let discord_events_rx = &mut self.discord_events_rx;
        let irc_event_rx = &mut self.irc_event_rx;
        let handler = &mut self.handler;
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::select! {
            _ = Self::run_connection(client, &self.token, &self.discord_events_tx) => {},
            _ = Self::process_events(discord_events_rx, irc_event_rx, handler, &mut self.shutdown_rx) => {},
            _ = async {
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                if let Some(ref manager) = shard_manager {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                    info!("Discord shutdown complete");
                }
            } => {}
        }
        info!("Discord task ended");
    }

    async fn run_connection(
        client: &mut Option<Client>,
        token: &str,
        discord_events_tx: &mpsc::UnboundedSender<DiscordBotEvent>,
    ) {
        /// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
        fn discord_backoff() -> impl Iterator<Item = Duration> {
            backon::ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(5))
                .with_max_delay(Duration::from_secs(300))
                .with_factor(1.1)
                .with_jitter()
                .without_max_times()
                .build()
        }

        let mut backoff = discord_backoff();

        loop {
            info!("Connecting to Discord...");

            let mut client = match client.take() {
                Some(client) => client,
                None => match build_client(token, discord_events_tx.clone()).await {
                    Ok(client) => {
                        backoff = discord_backoff();
                        client
                    }
                    Err(e) => {
                        error!("Failed to rebuild Discord client: {}", e);
                        let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                        warn!("Retrying in {:.1}s...", delay.as_secs_f64());
                        sleep(delay).await;
                        continue;
                    }
                },
            };

            match client.start().await {
                Ok(()) => {
                    info!("Discord client disconnected normally");
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    break;
                }
                Err(e) => {
                    error!("Discord client error: {}", e);
                    let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                    warn!(
                        "Discord disconnected. Reconnecting in {:.1}s...",
                        delay.as_secs_f64(),
                    );
                    if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                        warn!("Failed to process discord event: {}", error);
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    async fn process_events(
        discord_events_rx: &mut mpsc::UnboundedReceiver<DiscordBotEvent>,
        irc_event_rx: &mut mpsc::UnboundedReceiver<IrcEvent>,
        handler: &mut BridgeHandler,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                // Discord events
                event = discord_events_rx.recv() => {
                    match event {
                        Some(DiscordBotEvent::Ready { context, ready }) => {
                            handler.handle_ready(context, ready);
                        }
                        Some(DiscordBotEvent::GuildCreate { context, guild }) => {
                            handler.handle_guild_create(context, &guild);
                        }
                        Some(DiscordBotEvent::Message { context, message }) => {
                            handler.handle_message(&context, &message);
                        }
                        Some(DiscordBotEvent::Disconnected) => {
                            handler.handle_disconnected();
                        }
                        None => {
                            debug!("Discord events channel closed.");
                            break;
                        }
                    }
                }

                // IRC -> Discord
                event = irc_event_rx.recv() => {
                    match event {
                        Some(event) => handler.handle_irc_event(event).await,
                        None => {
                            warn!("IRC event channel closed");
                            break;
                        }
                    }
                }

                // Shutdown signal
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event processing");
                        break;
                    }
                }
            }
        }
    }
}
