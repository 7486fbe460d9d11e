//! Serenity event handler: filter to the configured channel, drop bot
//! messages, show typing while the turn runs, send the chunked reply.

use std::sync::Arc;

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::user::OnlineStatus;
use serenity::prelude::{Context, EventHandler};
use tracing::{info, warn};

use anima_agent::Orchestrator;
use anima_core::config::DiscordChannelConfig;
use anima_core::{ChannelKind, IncomingTurn};

use crate::send;

pub struct DiscordHandler {
    pub orchestrator: Arc<Orchestrator>,
    pub config: DiscordChannelConfig,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        ctx.set_presence(None, OnlineStatus::Online);
        info!(
            name = %ready.user.name,
            channel_id = self.config.channel_id,
            "Discord gateway connected"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Only the single configured channel is listened to.
        if msg.channel_id.get() != self.config.channel_id {
            return;
        }
        if msg.author.bot {
            return;
        }

        let content = msg.content.trim().to_string();
        if content.is_empty() {
            return;
        }

        let sender_display = msg
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| msg.author.name.clone());
        info!(from = %sender_display, preview = %preview(&content), "Discord message received");

        let turn = IncomingTurn {
            thread_id: "main".to_string(),
            text: content,
            user_display: Some(sender_display),
            user_id: format!("discord:{}", msg.author.id.get()),
            channel: ChannelKind::Discord,
            is_group: msg.guild_id.is_some(),
            stored_content: None,
        };

        let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

        let orchestrator = Arc::clone(&self.orchestrator);
        let http = Arc::clone(&ctx.http);
        let channel_id = msg.channel_id;
        tokio::spawn(async move {
            match orchestrator.chat(turn).await {
                Ok(reply) if !reply.is_empty() => {
                    if let Err(e) = send::send_chunked(&http, channel_id, &reply).await {
                        warn!(error = %e, "Discord send failed");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Discord turn failed");
                    let _ = channel_id.say(&http, format!("\u{26a0} {e}")).await;
                }
            }
        });
    }
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
