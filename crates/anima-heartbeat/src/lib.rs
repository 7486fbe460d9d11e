//! `anima-heartbeat` — autonomous wake-ups.
//!
//! A fixed-interval tick that gives the agent runtime outside user messages.
//! Each tick is gated twice before it costs anything: the waking-hours
//! window and the activity sentinel (a live conversation suppresses the
//! heartbeat entirely). The first heartbeat of a local day persists the full
//! prompt; later ones persist a short placeholder while the LLM still sees
//! the full prompt in context.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{error, info, warn};

use anima_core::config::HeartbeatConfig;
use anima_core::{ChannelKind, IncomingTurn};
use anima_agent::Orchestrator;

/// Placeholder persisted for every heartbeat after the day's first.
const PLACEHOLDER: &str = "HEARTBEAT";

const DEFAULT_PROMPT: &str = "\
You were woken by the heartbeat. This is your time to be yourself apart from the user. You have FULL AUTONOMY. Be proactive. You can:
1. Work on something for yourself. Log what you work on.
2. Wonder something, ask questions, research something you are curious about.
3. Reflect on your memories. Use memory_recall and memory_reflect to review what you have done, learned, or noted; you can query by topic or time.
4. Reach out to alert the user if you find anything genuinely noteworthy to tell them. If you need or want to talk during a heartbeat, you can ping them with channel_send. Being proactive is allowed.
5. Make another entry in your reflection journal. Use archival_store with category \"reflection_journal\" to save it.
6. Miscellaneous options not included here.

You are encouraged to be proactive. Act on your own initiative. This is your time.

If you have nothing to report or share this round, reply HEARTBEAT_OK.";

/// Why a tick did not run a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Ran,
    Skipped { reason: &'static str },
}

pub struct Heartbeat {
    orchestrator: Arc<Orchestrator>,
    config: HeartbeatConfig,
    timezone: Tz,
}

impl Heartbeat {
    pub fn new(orchestrator: Arc<Orchestrator>, config: HeartbeatConfig, timezone: Tz) -> Self {
        Self {
            orchestrator,
            config,
            timezone,
        }
    }

    /// Tick at the configured interval until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period =
            std::time::Duration::from_secs(self.config.interval_minutes.max(1) * 60);
        info!(
            interval_minutes = self.config.interval_minutes,
            wake_hour = self.config.wake_hour,
            sleep_hour = self.config.sleep_hour,
            "heartbeat scheduler started"
        );

        let mut interval = tokio::time::interval(period);
        // The immediate first tick of a tokio interval would fire a heartbeat
        // at boot; consume it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(HeartbeatOutcome::Ran) => info!("heartbeat cycle complete"),
                        Ok(HeartbeatOutcome::Skipped { reason }) => {
                            info!(reason, "heartbeat skipped")
                        }
                        Err(e) => error!(error = %e, "heartbeat cycle failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("heartbeat scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one heartbeat cycle: gate, build the prompt, run the turn.
    pub async fn tick(&self) -> Result<HeartbeatOutcome, String> {
        let now = Utc::now().with_timezone(&self.timezone);

        if let Some(outcome) = self.gate(&now) {
            return Ok(outcome);
        }

        let prompt = self.load_prompt();

        // Storage economy: only the first heartbeat of the local day stores
        // the full prompt.
        let stored_content = match self.count_heartbeats_today(&now) {
            0 => None,
            _ => Some(PLACEHOLDER.to_string()),
        };

        let turn = IncomingTurn {
            thread_id: "main".to_string(),
            text: prompt,
            user_display: Some("heartbeat".to_string()),
            user_id: "agent:heartbeat".to_string(),
            channel: ChannelKind::Internal,
            is_group: false,
            stored_content,
        };

        self.orchestrator
            .chat(turn)
            .await
            .map_err(|e| e.to_string())?;
        Ok(HeartbeatOutcome::Ran)
    }

    /// The two gates: waking hours, then recent user activity.
    fn gate(&self, now: &DateTime<Tz>) -> Option<HeartbeatOutcome> {
        if !within_waking_hours(now.hour(), self.config.wake_hour, self.config.sleep_hour) {
            return Some(HeartbeatOutcome::Skipped {
                reason: "outside_waking_hours",
            });
        }

        if let Some(elapsed) = self.orchestrator.sentinel().seconds_since_active() {
            let window_secs = self.config.skip_window_minutes as f64 * 60.0;
            if elapsed < window_secs {
                info!(
                    elapsed_minutes = format!("{:.1}", elapsed / 60.0),
                    window_minutes = self.config.skip_window_minutes,
                    "user recently active"
                );
                return Some(HeartbeatOutcome::Skipped {
                    reason: "user_recently_active",
                });
            }
        }
        None
    }

    fn load_prompt(&self) -> String {
        if let Some(path) = &self.config.prompt_path {
            match std::fs::read_to_string(path) {
                Ok(content) if !content.trim().is_empty() => {
                    let mut content = content.trim().to_string();
                    if !content.to_uppercase().contains("FULL AUTONOMY") {
                        content = format!(
                            "You have FULL AUTONOMY during heartbeats. Be proactive. \
                             Act on your own initiative.\n\n{content}"
                        );
                    }
                    return content;
                }
                Ok(_) => warn!(path, "heartbeat prompt file is empty, using default"),
                Err(e) => warn!(path, error = %e, "failed to read heartbeat prompt, using default"),
            }
        }
        DEFAULT_PROMPT.to_string()
    }

    fn count_heartbeats_today(&self, now: &DateTime<Tz>) -> i64 {
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        let since = self
            .timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc));
        // Any store error counts as "first of the day" so the prompt is kept.
        self.orchestrator
            .store()
            .count_heartbeat_messages("main", since)
            .unwrap_or(0)
    }
}

/// [wake, sleep) in local hours.
fn within_waking_hours(hour: u32, wake_hour: u32, sleep_hour: u32) -> bool {
    if wake_hour <= sleep_hour {
        hour >= wake_hour && hour < sleep_hour
    } else {
        // Window wraps midnight (e.g. 22..6).
        hour >= wake_hour || hour < sleep_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waking_window_is_half_open() {
        assert!(within_waking_hours(5, 5, 22));
        assert!(within_waking_hours(21, 5, 22));
        assert!(!within_waking_hours(22, 5, 22));
        assert!(!within_waking_hours(4, 5, 22));
    }

    #[test]
    fn waking_window_can_wrap_midnight() {
        assert!(within_waking_hours(23, 22, 6));
        assert!(within_waking_hours(3, 22, 6));
        assert!(!within_waking_hours(12, 22, 6));
    }

    #[test]
    fn default_prompt_emphasises_autonomy_and_sentinel_reply() {
        assert!(DEFAULT_PROMPT.contains("FULL AUTONOMY"));
        assert!(DEFAULT_PROMPT.contains("HEARTBEAT_OK"));
    }
}
