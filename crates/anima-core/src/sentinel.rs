//! Activity sentinel — a single-line file holding the Unix timestamp of the
//! last external user turn. The chat path writes it; the heartbeat reads it
//! to avoid waking while the user is mid-conversation.
//!
//! Only the most recent value matters, so concurrent writers are acceptable.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct ActivitySentinel {
    path: PathBuf,
}

impl ActivitySentinel {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Record "the user is active right now". Failures are non-critical and
    /// never fail a chat turn.
    pub fn touch(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        if let Err(e) = std::fs::write(&self.path, format!("{now}")) {
            debug!(path = %self.path.display(), error = %e, "sentinel write failed");
        }
    }

    /// Seconds since the last recorded activity. `None` when the file is
    /// missing or unreadable (treated by callers as "not recently active").
    pub fn seconds_since_active(&self) -> Option<f64> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let last: f64 = raw.trim().parse().ok()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()?
            .as_secs_f64();
        Some((now - last).max(0.0))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_none() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = ActivitySentinel::new(dir.path().join("last_active.txt"));
        assert!(sentinel.seconds_since_active().is_none());
    }

    #[test]
    fn touch_then_read_is_recent() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = ActivitySentinel::new(dir.path().join("last_active.txt"));
        sentinel.touch();
        let elapsed = sentinel.seconds_since_active().expect("sentinel readable");
        assert!(elapsed < 5.0, "expected fresh timestamp, got {elapsed}");
    }

    #[test]
    fn garbage_content_reports_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_active.txt");
        std::fs::write(&path, "not-a-number").unwrap();
        let sentinel = ActivitySentinel::new(&path);
        assert!(sentinel.seconds_since_active().is_none());
    }

    #[test]
    fn stale_timestamp_reports_elapsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_active.txt");
        let past = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs_f64()
            - 600.0;
        std::fs::write(&path, format!("{past}")).unwrap();
        let sentinel = ActivitySentinel::new(&path);
        let elapsed = sentinel.seconds_since_active().unwrap();
        assert!(elapsed >= 599.0);
    }
}
