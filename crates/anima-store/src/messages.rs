//! Conversation log: append-only rows with contiguous per-thread `idx`,
//! the "today OR last N" sliding window, and the token-budget trim.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::error::Result;
use crate::types::*;
use crate::Store;

/// Options for [`Store::load_messages`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Floor: at least this many recent messages are retained.
    pub limit: Option<usize>,
    /// Start of "today" in the agent timezone; everything at or after this
    /// instant is always retained.
    pub since: Option<DateTime<Utc>>,
    /// Final safety cap, applied after the window.
    pub max_tokens: Option<usize>,
    /// Tool returns are noise for recent context and excluded by default.
    pub exclude_tool: bool,
    /// Drop heartbeat-attributed rows (used for "regular chat only" views).
    pub exclude_heartbeat: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limit: None,
            since: None,
            max_tokens: None,
            exclude_tool: true,
            exclude_heartbeat: false,
        }
    }
}

impl Store {
    /// Load history for a thread, ordered by `idx` ascending, windowed by
    /// the "today OR last N, whichever covers more" policy, then trimmed to
    /// the token budget.
    pub fn load_messages(&self, thread_id: &str, opts: &LoadOptions) -> Result<Vec<StoredMessage>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, idx, role, content, reasoning, created_at, metadata
             FROM messages
             WHERE thread_id = ?1
             ORDER BY idx ASC",
        )?;
        let mut rows: Vec<StoredMessage> = stmt
            .query_map(params![thread_id], row_to_message)?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);
        drop(conn);

        if opts.exclude_tool {
            rows.retain(|m| m.role != Role::Tool);
        }
        if opts.exclude_heartbeat {
            rows.retain(|m| m.role_display() != Some("heartbeat"));
        }

        let mut out = apply_window(rows, opts.limit, opts.since);
        if let Some(max_tokens) = opts.max_tokens {
            if max_tokens > 0 {
                out = trim_to_token_budget(out, max_tokens);
            }
        }
        Ok(out)
    }

    /// Append rows with successive `idx` values. The `MAX(idx)+1` read and
    /// all inserts share one transaction, so `idx` stays contiguous even
    /// under interleaved writers.
    pub fn append_messages(
        &self,
        thread_id: &str,
        rows: &[NewMessage],
        user_display: Option<&str>,
    ) -> Result<()> {
        self.append_rows(thread_id, rows, user_display, Utc::now())
    }

    pub(crate) fn append_rows(
        &self,
        thread_id: &str,
        rows: &[NewMessage],
        user_display: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut next_idx: i64 = tx.query_row(
            "SELECT COALESCE(MAX(idx), -1) + 1 FROM messages WHERE thread_id = ?1",
            params![thread_id],
            |r| r.get(0),
        )?;

        let stamp = to_rfc3339(created_at);
        for row in rows {
            let mut metadata = match &row.metadata {
                Some(serde_json::Value::Object(map)) => map.clone(),
                _ => serde_json::Map::new(),
            };
            if row.role == Role::User {
                if let Some(display) = user_display {
                    metadata.insert(
                        "role_display".to_string(),
                        serde_json::Value::String(display.to_string()),
                    );
                }
            }

            tx.execute(
                "INSERT INTO messages (thread_id, idx, role, content, reasoning, created_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    thread_id,
                    next_idx,
                    row.role.to_string(),
                    row.content,
                    row.reasoning,
                    stamp,
                    serde_json::Value::Object(metadata).to_string(),
                ],
            )?;
            next_idx += 1;
        }
        tx.commit()?;
        Ok(())
    }

    /// Case-insensitive substring search over user and assistant rows,
    /// newest first.
    pub fn search_messages(
        &self,
        query: &str,
        thread_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let pattern = format!("%{query}%");
        let conn = self.conn();
        let mut out = Vec::new();

        if let Some(thread) = thread_id {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, idx, role, content, reasoning, created_at, metadata
                 FROM messages
                 WHERE content LIKE ?1 COLLATE NOCASE
                   AND role IN ('user', 'assistant')
                   AND thread_id = ?2
                 ORDER BY idx DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![pattern, thread, limit as i64], row_to_message)?;
            out.extend(rows.filter_map(|r| r.ok()));
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, idx, role, content, reasoning, created_at, metadata
                 FROM messages
                 WHERE content LIKE ?1 COLLATE NOCASE
                   AND role IN ('user', 'assistant')
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit as i64], row_to_message)?;
            out.extend(rows.filter_map(|r| r.ok()));
        }
        Ok(out)
    }

    /// Number of heartbeat-attributed user rows at or after `since`. Drives
    /// the first-heartbeat-of-the-day storage economy.
    pub fn count_heartbeat_messages(&self, thread_id: &str, since: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE thread_id = ?1
               AND role = 'user'
               AND json_extract(metadata, '$.role_display') = 'heartbeat'
               AND created_at >= ?2",
            params![thread_id, to_rfc3339(since)],
            |r| r.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role_str: String = row.get(3)?;
    let created_str: String = row.get(6)?;
    let metadata_str: String = row.get(7)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        idx: row.get(2)?,
        role: role_str.parse().unwrap_or(Role::User),
        content: row.get(4)?,
        reasoning: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
    })
}

/// The "today OR last N, whichever covers more" window: take the suffix from
/// whichever boundary is earlier, so a busy day never drops same-day context
/// and a quiet day still has at least `limit` messages.
fn apply_window(
    rows: Vec<StoredMessage>,
    limit: Option<usize>,
    since: Option<DateTime<Utc>>,
) -> Vec<StoredMessage> {
    if limit.is_none() && since.is_none() {
        return rows;
    }

    let today_start = match since {
        Some(boundary) => rows
            .iter()
            .position(|m| m.created_at >= boundary)
            .unwrap_or(rows.len()),
        None => rows.len(),
    };
    let last_n_start = match limit {
        Some(n) => rows.len().saturating_sub(n),
        None => rows.len(),
    };

    let start = today_start.min(last_n_start);
    rows.into_iter().skip(start).collect()
}

/// Keep the most recent messages that fit within `max_tokens`. Always keeps
/// at least the newest message.
fn trim_to_token_budget(rows: Vec<StoredMessage>, max_tokens: usize) -> Vec<StoredMessage> {
    let mut total = 0usize;
    let mut kept = Vec::new();
    for row in rows.into_iter().rev() {
        let mut text_len = row.content.chars().count();
        if let Some(reasoning) = &row.reasoning {
            text_len += reasoning.chars().count();
        }
        let tokens = estimate_tokens_from_chars(text_len);
        if total + tokens > max_tokens && !kept.is_empty() {
            break;
        }
        total += tokens;
        kept.push(row);
    }
    kept.reverse();
    kept
}

/// ~4 characters per token, rounded up.
fn estimate_tokens_from_chars(chars: usize) -> usize {
    chars.div_ceil(4)
}
