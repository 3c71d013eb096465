//! discord-irc - IRC <-> Discord chat bridge
//!
//! Relays messages between mapped IRC channels and Discord text channels,
//! translating formatting, mentions and channel names in both directions.

mod bridge;
mod common;
mod config;
mod discord;
mod format;
mod irc;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::bridge::{Bridge, ChannelBundle};
use crate::config::{env::get_config_path, load_and_validate};
use crate::discord::{DiscordBotBuilder, DiscordChannels};
use crate::irc::IrcClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("discord-irc v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  IRC server: {}:{}", config.server, config.irc_options.port);
    info!("  IRC nickname: {}", config.nickname);

    let bridge = Arc::new(Bridge::new(config)?);
    let channels = ChannelBundle::new();

    // ============================================================
    // Discord
    // ============================================================
    let discord_channels = DiscordChannels {
        irc_command_tx: channels.discord.irc_command_tx,
        irc_event_rx: channels.discord.irc_event_rx,
        shutdown_rx: channels.irc.shutdown_rx.clone(),
    };

    let discord_bot = DiscordBotBuilder::new(
        bridge.config().discord_token.clone(),
        bridge.clone(),
        discord_channels,
    )
    .build()
    .await?;

    info!("Starting Discord bot...");
    let discord_task = tokio::spawn(async move {
        discord_bot.run().await;
    });

    // ============================================================
    // IRC
    // ============================================================
    let shutdown_tx = channels.control.shutdown_tx;
    let mut irc_client = IrcClient::new(bridge.config(), bridge.irc_channels(), channels.irc);

    let mut irc_task = tokio::spawn(async move {
        if let Err(e) = irc_client.run().await {
            error!("IRC session ended: {}", e);
        }
    });

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - disconnecting...");
            true
        }
        _ = &mut irc_task => false,
        _ = discord_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (clients already exited): {}", e);
        }
        let timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(timeout, irc_task).await {
            Ok(Ok(())) => info!("IRC session closed gracefully"),
            Ok(Err(e)) => warn!("IRC task panicked: {}", e),
            Err(_) => warn!("IRC disconnect timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
