use std::time::Duration;

use rusqlite::Connection;
use tracing::warn;

use crate::error::Result;

/// Bounded retry on open: transient filesystem/lock failures get two more
/// attempts with a 2 s delay, matching the gateway's startup contract.
const OPEN_RETRIES: usize = 2;
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(2);

pub fn open_with_retry(path: &str) -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut last_err = None;
    for attempt in 0..=OPEN_RETRIES {
        match Connection::open(path) {
            Ok(conn) => {
                conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
                return Ok(conn);
            }
            Err(e) => {
                if attempt < OPEN_RETRIES {
                    warn!(
                        attempt = attempt + 1,
                        max = OPEN_RETRIES + 1,
                        error = %e,
                        "database open failed, retrying in {}s",
                        OPEN_RETRY_DELAY.as_secs()
                    );
                    std::thread::sleep(OPEN_RETRY_DELAY);
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.expect("retry loop ran at least once").into())
}

/// Create all tables. Safe to call on every startup (idempotent).
pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id   TEXT    NOT NULL,
            idx         INTEGER NOT NULL,
            role        TEXT    NOT NULL CHECK (role IN ('user', 'assistant', 'tool')),
            content     TEXT    NOT NULL,
            reasoning   TEXT,
            created_at  TEXT    NOT NULL,
            metadata    TEXT    NOT NULL DEFAULT '{}',
            UNIQUE(thread_id, idx)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);

        CREATE TABLE IF NOT EXISTS core_memory (
            block_type  TEXT PRIMARY KEY CHECK (block_type IN ('user', 'identity', 'ideaspace')),
            content     TEXT    NOT NULL DEFAULT '',
            version     INTEGER NOT NULL DEFAULT 1,
            updated_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS core_memory_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            block_type  TEXT    NOT NULL,
            content     TEXT    NOT NULL,
            version     INTEGER NOT NULL,
            updated_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS system_instructions (
            id          INTEGER PRIMARY KEY CHECK (id = 1),
            content     TEXT    NOT NULL DEFAULT '',
            updated_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS archival_facts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            content     TEXT    NOT NULL,
            category    TEXT,
            created_at  TEXT    NOT NULL,
            metadata    TEXT    NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_archival_category ON archival_facts(category);
        CREATE INDEX IF NOT EXISTS idx_archival_created ON archival_facts(created_at DESC);

        CREATE TABLE IF NOT EXISTS daily_summaries (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            summary_date TEXT    NOT NULL UNIQUE,
            content      TEXT    NOT NULL,
            created_at   TEXT    NOT NULL,
            updated_at   TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cron_jobs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT    NOT NULL,
            description     TEXT,
            instructions    TEXT    NOT NULL,
            timezone        TEXT    NOT NULL DEFAULT 'America/New_York',
            schedule_days   TEXT,               -- JSON array of weekdays, 0=Monday
            schedule_time   TEXT,               -- 'HH:MM AM/PM' or 'HH:MM'
            run_date        TEXT,               -- YYYY-MM-DD, one-time jobs only
            is_one_time     INTEGER NOT NULL DEFAULT 0,
            status          TEXT    NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'paused')),
            created_by      TEXT    NOT NULL DEFAULT 'user' CHECK (created_by IN ('user', 'agent')),
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL,
            last_run_at     TEXT,
            last_run_status TEXT CHECK (last_run_status IN ('success', 'error', 'skipped', 'aborted')),
            last_run_error  TEXT,
            run_count       INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_cron_jobs_status ON cron_jobs(status);
        ",
    )?;

    // Seed the read-only singleton so reads never special-case absence.
    conn.execute(
        "INSERT OR IGNORE INTO system_instructions (id, content, updated_at) VALUES (1, '', ?1)",
        [crate::types::now_rfc3339()],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_schema(&conn).unwrap();
        setup_schema(&conn).unwrap();
        setup_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM system_instructions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1, "singleton seeded exactly once");
    }
}
