//! Bridge channel management.
//!
//! Groups the queues that connect the IRC session, the Discord dispatch
//! loop and shutdown coordination.

use tokio::sync::{mpsc, watch};

use crate::common::messages::{IrcCommand, IrcEvent};

/// Channels owned by the IRC session.
pub struct IrcChannels {
    /// Sender for IRC events (IRC -> Discord loop).
    pub event_tx: mpsc::UnboundedSender<IrcEvent>,
    /// Receiver for commands to perform on IRC.
    pub command_rx: mpsc::UnboundedReceiver<IrcCommand>,
    /// Receiver for the shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels owned by the Discord side.
pub struct DiscordSideChannels {
    /// Receiver for IRC events.
    pub irc_event_rx: mpsc::UnboundedReceiver<IrcEvent>,
    /// Sender for commands to the IRC session.
    pub irc_command_tx: mpsc::UnboundedSender<IrcCommand>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels created by the bridge.
pub struct ChannelBundle {
    pub irc: IrcChannels,
    pub discord: DiscordSideChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    /// Create a fresh set of bridge channels.
    pub fn new() -> Self {
        let (event_tx, irc_event_rx) = mpsc::unbounded_channel();
        let (irc_command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            irc: IrcChannels {
                event_tx,
                command_rx,
                shutdown_rx,
            },
            discord: DiscordSideChannels {
                irc_event_rx,
                irc_command_tx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
