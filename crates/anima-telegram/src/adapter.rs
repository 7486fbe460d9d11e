//! Telegram inbound adapter — manual long polling.
//!
//! On startup the bot token is verified and any pending updates are fetched
//! once and discarded, advancing the offset so a restart never replays
//! history. The main loop then long-polls getUpdates with a 30 s server
//! timeout (the HTTP client timeout is longer), filters to the configured
//! chat, drops bot messages, and runs each turn off the poll loop.

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, Message, Update, UpdateKind};
use teloxide::{ApiError, RequestError};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use anima_agent::Orchestrator;
use anima_core::config::TelegramChannelConfig;
use anima_core::{ChannelKind, ChannelOutbound, IncomingTurn};

use crate::send;
use crate::typing::TypingHandle;

/// Seconds Telegram holds the connection open waiting for updates.
const LONG_POLL_TIMEOUT_SECS: u32 = 30;
/// Extra room on the HTTP client so the server-side timeout wins.
const CLIENT_TIMEOUT_BUFFER_SECS: u64 = 10;
/// Back-off after a 409 conflict (another poller holds getUpdates).
const CONFLICT_BACKOFF: Duration = Duration::from_secs(10);
/// Back-off after any other transient poll error.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct TelegramAdapter {
    orchestrator: Arc<Orchestrator>,
    config: TelegramChannelConfig,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramChannelConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            config: config.clone(),
        }
    }

    /// Drive the long-poll loop until `shutdown` broadcasts `true`.
    ///
    /// When `outbound_rx` is set, a delivery task is spawned that pushes
    /// agent-initiated messages (`channel_send`) into Telegram chats.
    pub async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        outbound_rx: Option<mpsc::Receiver<ChannelOutbound>>,
    ) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                LONG_POLL_TIMEOUT_SECS as u64 + CLIENT_TIMEOUT_BUFFER_SECS,
            ))
            .build()
            .unwrap_or_default();
        let bot = Bot::with_client(&self.config.bot_token, client);

        if let Some(rx) = outbound_rx {
            tokio::spawn(deliver_outbound(bot.clone(), rx));
        }

        // Verify the token before doing anything.
        match bot.get_me().await {
            Ok(me) => info!(
                username = me.username(),
                id = me.id.0,
                "Telegram bot verified"
            ),
            Err(e) => {
                error!(error = %e, "Telegram adapter aborting: invalid bot token or network error");
                return;
            }
        }

        // Consume pending updates so we never reply to history.
        let mut offset: Option<i32> = None;
        match self.fetch_updates(&bot, offset, 0).await {
            Ok(pending) if !pending.is_empty() => {
                offset = pending.last().map(next_offset);
                info!(
                    skipped = pending.len(),
                    ?offset,
                    "Telegram ready, skipped pending updates"
                );
            }
            Ok(_) => info!("Telegram ready, no pending updates"),
            Err(e) => warn!(error = %e, "failed to drain pending updates"),
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Telegram adapter shutting down");
                        break;
                    }
                }
                result = self.fetch_updates(&bot, offset, LONG_POLL_TIMEOUT_SECS) => match result {
                    Ok(updates) => {
                        for update in updates {
                            // Always advance, even for filtered messages.
                            offset = Some(next_offset(&update));
                            self.handle_update(&bot, update);
                        }
                    }
                    Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                        error!(
                            "Telegram 409 conflict: another getUpdates poller is running, backing off"
                        );
                        tokio::time::sleep(CONFLICT_BACKOFF).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Telegram poll error");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }

    async fn fetch_updates(
        &self,
        bot: &Bot,
        offset: Option<i32>,
        timeout: u32,
    ) -> Result<Vec<Update>, RequestError> {
        let mut req = bot
            .get_updates()
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message]);
        if let Some(offset) = offset {
            req = req.offset(offset);
        }
        req.await
    }

    /// Filter and dispatch one update. Turn processing is spawned so the
    /// poll loop keeps draining while the LLM works.
    fn handle_update(&self, bot: &Bot, update: Update) {
        let UpdateKind::Message(msg) = update.kind else {
            return;
        };

        if msg.chat.id.0 != self.config.chat_id {
            info!(
                chat_id = msg.chat.id.0,
                expected = self.config.chat_id,
                "ignoring message from unconfigured chat"
            );
            return;
        }

        let Some(from) = msg.from.clone() else {
            return;
        };
        if from.is_bot {
            return;
        }

        let text = msg.text().unwrap_or("").trim().to_string();
        if text.is_empty() {
            return;
        }

        let sender_display = from
            .username
            .clone()
            .unwrap_or_else(|| from.first_name.clone());
        info!(from = %sender_display, preview = %preview(&text), "Telegram message received");

        let turn = IncomingTurn {
            thread_id: "main".to_string(),
            text,
            user_display: Some(sender_display),
            user_id: format!("telegram:{}", from.id.0),
            channel: ChannelKind::Telegram,
            is_group: is_group_chat(&msg),
            stored_content: None,
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        let bot = bot.clone();
        let chat_id = msg.chat.id;
        tokio::spawn(async move {
            let typing = TypingHandle::start(bot.clone(), chat_id);
            let result = orchestrator.chat(turn).await;
            typing.stop();

            match result {
                Ok(reply) if !reply.is_empty() => {
                    send::send_response(&bot, chat_id, &reply).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Telegram turn failed");
                    let _ = bot
                        .send_message(chat_id, format!("\u{26a0} {e}"))
                        .await;
                }
            }
        });
    }
}

/// Drain agent-initiated messages into their target chats. Recipients that
/// are not Telegram chat ids are dropped with a warning.
async fn deliver_outbound(bot: Bot, mut rx: mpsc::Receiver<ChannelOutbound>) {
    info!("Telegram outbound delivery task started");
    while let Some(outbound) = rx.recv().await {
        match outbound.recipient.parse::<i64>() {
            Ok(raw_id) => send::send_response(&bot, ChatId(raw_id), &outbound.message).await,
            Err(_) => warn!(
                recipient = %outbound.recipient,
                "Telegram outbound: recipient is not a chat id"
            ),
        }
    }
    warn!("Telegram outbound delivery task ended (queue closed)");
}

fn next_offset(update: &Update) -> i32 {
    update.id.0 as i32 + 1
}

fn is_group_chat(msg: &Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
