//! Process entry point: load config, open the store, build the turn
//! pipeline, start the cron engine, heartbeat and channel adapters, then
//! serve the HTTP surface until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

mod app;
mod http;

use anima_agent::{openai::OpenAiProvider, tools, Orchestrator, OutboundRouter, TurnSettings};
use anima_core::{ActivitySentinel, AnimaConfig, ChannelKind, IncomingTurn};
use anima_cron::{CronEngine, CronHandle, JobRunner};
use anima_discord::DiscordAdapter;
use anima_episodic::EpisodicMemory;
use anima_heartbeat::Heartbeat;
use anima_store::Store;
use anima_telegram::TelegramAdapter;

#[derive(Parser)]
#[command(name = "anima-gateway", about = "Stateful conversational agent runtime")]
struct Args {
    /// Path to the TOML config file (default: anima.toml).
    #[arg(long)]
    config: Option<String>,
}

/// Cron executions are ordinary turns on the main thread, attributed to the
/// cron source and kept off the activity sentinel.
struct OrchestratorRunner(Arc<Orchestrator>);

#[async_trait]
impl JobRunner for OrchestratorRunner {
    async fn run_job(&self, message: &str) -> Result<(), String> {
        let turn = IncomingTurn {
            thread_id: "main".to_string(),
            text: message.to_string(),
            user_display: Some("cron".to_string()),
            user_id: "agent:cron".to_string(),
            channel: ChannelKind::Internal,
            is_group: false,
            stored_content: None,
        };
        self.0
            .chat(turn)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AnimaConfig::load(args.config.as_deref())?;
    let _log_guard = init_tracing(&config);

    info!(
        timezone = %config.agent.timezone,
        model = %config.llm.model,
        db = %config.database.url,
        "anima starting"
    );
    if config.llm.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; chat turns will fail until it is configured");
    }

    let store = Arc::new(Store::open(&config.database.url)?);
    let episodic = Arc::new(EpisodicMemory::new(&config.episodic));
    let cron = CronHandle::new(Arc::clone(&store));
    let sentinel = ActivitySentinel::new(config.sentinel_path());

    let provider = Box::new(OpenAiProvider::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    ));
    let outbound = Arc::new(OutboundRouter::new());
    let tool_set = tools::build_tools(
        Arc::clone(&store),
        Arc::clone(&episodic),
        cron.clone(),
        Arc::clone(&outbound),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        tool_set,
        Arc::clone(&store),
        episodic,
        sentinel,
        TurnSettings::from_config(&config),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = CronEngine::new(
        cron.clone(),
        Arc::new(OrchestratorRunner(Arc::clone(&orchestrator))),
    );
    tokio::spawn(engine.run(shutdown_rx.clone()));

    let heartbeat = Heartbeat::new(
        Arc::clone(&orchestrator),
        config.heartbeat.clone(),
        config.agent_tz(),
    );
    tokio::spawn(heartbeat.run(shutdown_rx.clone()));

    match &config.channels.telegram {
        Some(telegram) => {
            let adapter = TelegramAdapter::new(telegram, Arc::clone(&orchestrator));
            let rx = outbound.register("telegram");
            tokio::spawn(adapter.run(shutdown_rx.clone(), Some(rx)));
        }
        None => info!("Telegram adapter not configured"),
    }
    match &config.channels.discord {
        Some(discord) => {
            let adapter = DiscordAdapter::new(discord, Arc::clone(&orchestrator));
            let rx = outbound.register("discord");
            tokio::spawn(adapter.run(shutdown_rx.clone(), Some(rx)));
        }
        None => info!("Discord adapter not configured"),
    }

    let addr: SocketAddr =
        format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState {
        config,
        store,
        orchestrator,
        cron,
    });
    let router = app::build_router(state);

    info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

/// Stderr plus a daily-rotating file under `{data_dir}/logs`.
fn init_tracing(config: &AnimaConfig) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = std::path::Path::new(&config.database.data_dir).join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, "anima.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();
    guard
}
