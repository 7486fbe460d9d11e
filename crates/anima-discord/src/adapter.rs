//! Discord channel adapter. Wraps a serenity `Client` and keeps rebuilding
//! the connection whenever the gateway drops, so the bot stays online for
//! the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use serenity::http::Http;
use serenity::model::gateway::GatewayIntents;
use serenity::model::id::ChannelId;
use serenity::Client;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use anima_agent::Orchestrator;
use anima_core::config::DiscordChannelConfig;
use anima_core::ChannelOutbound;

use crate::handler::DiscordHandler;
use crate::send;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const BUILD_RETRY_DELAY: Duration = Duration::from_secs(30);

pub struct DiscordAdapter {
    orchestrator: Arc<Orchestrator>,
    config: DiscordChannelConfig,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordChannelConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            config: config.clone(),
        }
    }

    /// Connect and keep reconnecting until `shutdown` broadcasts `true`.
    ///
    /// When `outbound_rx` is set, a delivery task for agent-initiated
    /// messages (`channel_send`) is spawned once, over the REST client: that
    /// handle stays valid across gateway reconnects.
    pub async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        mut outbound_rx: Option<mpsc::Receiver<ChannelOutbound>>,
    ) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        loop {
            let mut client = match self.build_client(intents).await {
                Ok(client) => client,
                Err(e) => {
                    error!(error = %e, "Discord client build failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(BUILD_RETRY_DELAY) => continue,
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() { return; }
                            continue;
                        }
                    }
                }
            };

            if let Some(rx) = outbound_rx.take() {
                tokio::spawn(deliver_outbound(Arc::clone(&client.http), rx));
            }

            info!("Discord gateway connecting");
            tokio::select! {
                result = client.start() => {
                    match result {
                        Err(e) => warn!(error = %e, "Discord gateway error, reconnecting"),
                        Ok(()) => info!("Discord gateway stopped cleanly, reconnecting"),
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Discord adapter shutting down");
                        client.shard_manager.shutdown_all().await;
                        return;
                    }
                }
            }
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            orchestrator: Arc::clone(&self.orchestrator),
            config: self.config.clone(),
        };
        Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}

/// Drain agent-initiated messages into their target channels. Recipients
/// that are not Discord channel ids are dropped with a warning.
async fn deliver_outbound(http: Arc<Http>, mut rx: mpsc::Receiver<ChannelOutbound>) {
    info!("Discord outbound delivery task started");
    while let Some(outbound) = rx.recv().await {
        let Ok(raw_id) = outbound.recipient.parse::<u64>() else {
            warn!(
                recipient = %outbound.recipient,
                "Discord outbound: recipient is not a channel id"
            );
            continue;
        };
        if let Err(e) = send::send_chunked(&http, ChannelId::new(raw_id), &outbound.message).await {
            warn!(error = %e, channel_id = raw_id, "Discord outbound send failed");
        }
    }
    warn!("Discord outbound delivery task ended (queue closed)");
}
