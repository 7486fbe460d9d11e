//! Heartbeat gating and storage economy against a full orchestrator.

use std::sync::Arc;

use async_trait::async_trait;

use anima_agent::{ChatRequest, ChatResponse, LlmProvider, Orchestrator, ProviderError, TurnSettings};
use anima_core::config::{EpisodicConfig, HeartbeatConfig};
use anima_core::{ActivitySentinel, ChannelKind};
use anima_episodic::EpisodicMemory;
use anima_heartbeat::{Heartbeat, HeartbeatOutcome};
use anima_store::{LoadOptions, Store};

/// Provider that always acknowledges the heartbeat.
struct AckProvider;

#[async_trait]
impl LlmProvider for AckProvider {
    fn name(&self) -> &str {
        "ack"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Ok(ChatResponse {
            content: "HEARTBEAT_OK".into(),
            model: "test".into(),
            tokens_in: 1,
            tokens_out: 1,
            stop_reason: "stop".into(),
            tool_calls: Vec::new(),
        })
    }
}

struct Fixture {
    heartbeat: Heartbeat,
    store: Arc<Store>,
    sentinel: ActivitySentinel,
    _dir: tempfile::TempDir,
}

fn fixture(config: HeartbeatConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let sentinel = ActivitySentinel::new(dir.path().join("last_active.txt"));
    let episodic = Arc::new(EpisodicMemory::new(&EpisodicConfig {
        enabled: false,
        ..Default::default()
    }));
    let settings = TurnSettings {
        timezone: chrono_tz::UTC,
        recent_messages_limit: 30,
        context_window_tokens: 200_000,
        summary_days: 7,
        model: "test".into(),
        default_user_id: "local:user".into(),
        default_channel: ChannelKind::Local,
    };
    let orchestrator = Arc::new(Orchestrator::new(
        Box::new(AckProvider),
        Vec::new(),
        Arc::clone(&store),
        episodic,
        sentinel.clone(),
        settings,
    ));
    let heartbeat = Heartbeat::new(orchestrator, config, chrono_tz::UTC);
    Fixture {
        heartbeat,
        store,
        sentinel,
        _dir: dir,
    }
}

fn always_awake() -> HeartbeatConfig {
    HeartbeatConfig {
        interval_minutes: 60,
        wake_hour: 0,
        sleep_hour: 24,
        skip_window_minutes: 5,
        prompt_path: None,
    }
}

#[tokio::test]
async fn recent_user_activity_suppresses_the_heartbeat() {
    let fx = fixture(always_awake());
    fx.sentinel.touch();

    let outcome = fx.heartbeat.tick().await.unwrap();
    assert_eq!(
        outcome,
        HeartbeatOutcome::Skipped {
            reason: "user_recently_active"
        }
    );

    let rows = fx.store.load_messages("main", &LoadOptions::default()).unwrap();
    assert!(rows.is_empty(), "a skipped heartbeat persists nothing");
}

#[tokio::test]
async fn outside_waking_hours_never_runs() {
    let mut config = always_awake();
    config.wake_hour = 0;
    config.sleep_hour = 0;
    let fx = fixture(config);

    let outcome = fx.heartbeat.tick().await.unwrap();
    assert_eq!(
        outcome,
        HeartbeatOutcome::Skipped {
            reason: "outside_waking_hours"
        }
    );
}

#[tokio::test]
async fn first_heartbeat_stores_prompt_later_ones_store_placeholder() {
    let fx = fixture(always_awake());

    assert_eq!(fx.heartbeat.tick().await.unwrap(), HeartbeatOutcome::Ran);
    assert_eq!(fx.heartbeat.tick().await.unwrap(), HeartbeatOutcome::Ran);

    let rows = fx.store.load_messages("main", &LoadOptions::default()).unwrap();
    // user+assistant per tick.
    assert_eq!(rows.len(), 4);
    assert!(
        rows[0].content.contains("FULL AUTONOMY"),
        "first heartbeat of the day keeps the full prompt"
    );
    assert_eq!(rows[2].content, "HEARTBEAT");
    assert_eq!(rows[0].role_display(), Some("heartbeat"));
    assert_eq!(rows[2].role_display(), Some("heartbeat"));

    // Internal turns never touch the activity sentinel.
    assert!(fx.sentinel.seconds_since_active().is_none());
}
