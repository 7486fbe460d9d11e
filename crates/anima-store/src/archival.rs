//! Archival memory: curated facts the agent chooses to keep, structurally
//! separate from the conversation log.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::error::{Result, StoreError};
use crate::types::*;
use crate::Store;

/// Query results are capped regardless of the caller's limit.
const MAX_QUERY_RESULTS: usize = 50;

impl Store {
    pub fn store_fact(&self, content: &str, category: Option<&str>) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::EmptyContent);
        }
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        let conn = self.conn();
        conn.execute(
            "INSERT INTO archival_facts (content, category, created_at) VALUES (?1, ?2, ?3)",
            params![content, category, now_rfc3339()],
        )?;
        Ok(())
    }

    /// Substring match over content OR category, optionally AND-filtered by
    /// exact category, newest first.
    pub fn query_facts(
        &self,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ArchivalFact>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_QUERY_RESULTS) as i64;
        let pattern = format!("%{query}%");

        let conn = self.conn();
        let mut out = Vec::new();
        if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
            let mut stmt = conn.prepare(
                "SELECT content, category, created_at FROM archival_facts
                 WHERE (content LIKE ?1 COLLATE NOCASE OR category LIKE ?1 COLLATE NOCASE)
                   AND category = ?2
                 ORDER BY created_at DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![pattern, category, limit], row_to_fact)?;
            out.extend(rows.filter_map(|r| r.ok()));
        } else {
            let mut stmt = conn.prepare(
                "SELECT content, category, created_at FROM archival_facts
                 WHERE content LIKE ?1 COLLATE NOCASE OR category LIKE ?1 COLLATE NOCASE
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit], row_to_fact)?;
            out.extend(rows.filter_map(|r| r.ok()));
        }
        Ok(out)
    }
}

fn row_to_fact(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchivalFact> {
    let created_str: String = row.get(2)?;
    Ok(ArchivalFact {
        content: row.get(0)?,
        category: row.get(1)?,
        created_at: DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.store_fact("   ", None),
            Err(StoreError::EmptyContent)
        ));
    }

    #[test]
    fn query_matches_content_or_category() {
        let store = Store::open_in_memory().unwrap();
        store.store_fact("prefers dark roast", Some("coffee")).unwrap();
        store.store_fact("coffee shop on 5th", Some("places")).unwrap();
        store.store_fact("likes hiking", Some("hobbies")).unwrap();

        let hits = store.query_facts("coffee", None, 10).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn category_filter_is_exact_and_anded() {
        let store = Store::open_in_memory().unwrap();
        store.store_fact("prefers dark roast", Some("coffee")).unwrap();
        store.store_fact("coffee shop on 5th", Some("places")).unwrap();

        let hits = store.query_facts("coffee", Some("places"), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category.as_deref(), Some("places"));
    }

    #[test]
    fn blank_category_stored_as_null() {
        let store = Store::open_in_memory().unwrap();
        store.store_fact("a fact", Some("  ")).unwrap();
        let hits = store.query_facts("fact", None, 10).unwrap();
        assert_eq!(hits[0].category, None);
    }

    #[test]
    fn limit_is_capped_at_fifty() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..60 {
            store.store_fact(&format!("note {i}"), None).unwrap();
        }
        let hits = store.query_facts("note", None, 500).unwrap();
        assert_eq!(hits.len(), 50);
    }
}
