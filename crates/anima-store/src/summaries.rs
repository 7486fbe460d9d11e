//! Daily summaries: one agent-authored synopsis per date, upserted
//! unconditionally, surfaced in the prompt for temporal continuity.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

use crate::error::Result;
use crate::types::*;
use crate::Store;

impl Store {
    /// Unconditional overwrite by date.
    pub fn upsert_daily_summary(&self, date: NaiveDate, content: &str) -> Result<()> {
        let conn = self.conn();
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO daily_summaries (summary_date, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(summary_date) DO UPDATE SET
                 content = excluded.content,
                 updated_at = excluded.updated_at",
            params![date.to_string(), content, now],
        )?;
        Ok(())
    }

    /// The newest `n` summaries, most recent date first.
    pub fn load_daily_summaries(&self, n: usize) -> Result<Vec<DailySummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT summary_date, content, created_at, updated_at
             FROM daily_summaries
             ORDER BY summary_date DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| {
            let date_str: String = row.get(0)?;
            let created_str: String = row.get(2)?;
            let updated_str: String = row.get(3)?;
            Ok(DailySummary {
                summary_date: date_str.parse().unwrap_or_default(),
                content: row.get(1)?,
                created_at: parse_utc(&created_str),
                updated_at: parse_utc(&updated_str),
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn parse_utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn upsert_overwrites_same_date() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_daily_summary(date("2026-02-24"), "first draft").unwrap();
        store.upsert_daily_summary(date("2026-02-24"), "revised").unwrap();

        let rows = store.load_daily_summaries(10).unwrap();
        assert_eq!(rows.len(), 1, "at most one row per date");
        assert_eq!(rows[0].content, "revised");
    }

    #[test]
    fn load_returns_newest_first_capped_at_n() {
        let store = Store::open_in_memory().unwrap();
        for day in 20..=26 {
            store
                .upsert_daily_summary(date(&format!("2026-02-{day}")), &format!("day {day}"))
                .unwrap();
        }

        let rows = store.load_daily_summaries(3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].summary_date, date("2026-02-26"));
        assert_eq!(rows[2].summary_date, date("2026-02-24"));
    }
}
