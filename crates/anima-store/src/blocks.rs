//! Core memory blocks: three editable, versioned, rollback-capable blocks
//! plus the read-only system-instructions singleton.
//!
//! Every edit saves the prior (content, version) pair to history first; a
//! rollback restores the newest history row and deletes it, so repeated
//! rollbacks walk further back.

use rusqlite::{params, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::types::*;
use crate::Store;

impl Store {
    /// All four blocks, missing editable blocks rendered as empty strings.
    pub fn get_all_blocks(&self) -> Result<CoreBlocks> {
        let mut blocks = CoreBlocks {
            system_instructions: self.get_system_instructions()?,
            ..CoreBlocks::default()
        };

        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT block_type, content FROM core_memory")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows.filter_map(|r| r.ok()) {
            match row.0.as_str() {
                "user" => blocks.user = row.1,
                "identity" => blocks.identity = row.1,
                "ideaspace" => blocks.ideaspace = row.1,
                _ => {}
            }
        }
        Ok(blocks)
    }

    pub fn get_block(&self, block: BlockType) -> Result<String> {
        let conn = self.conn();
        let content: Option<String> = conn
            .query_row(
                "SELECT content FROM core_memory WHERE block_type = ?1",
                params![block.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(content.unwrap_or_default())
    }

    /// Replace block content. The prior version goes to history; the live
    /// row's version is bumped by one. Returns the new version.
    pub fn update_block(&self, block: BlockType, content: &str) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT version FROM core_memory WHERE block_type = ?1",
                params![block.to_string()],
                |r| r.get(0),
            )
            .optional()?;

        let new_version = match existing {
            Some(version) => {
                tx.execute(
                    "INSERT INTO core_memory_history (block_type, content, version, updated_at)
                     SELECT block_type, content, version, updated_at FROM core_memory
                     WHERE block_type = ?1",
                    params![block.to_string()],
                )?;
                version + 1
            }
            None => 1,
        };

        tx.execute(
            "INSERT INTO core_memory (block_type, content, version, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(block_type) DO UPDATE SET
                 content = excluded.content,
                 version = excluded.version,
                 updated_at = excluded.updated_at",
            params![block.to_string(), content, new_version, now_rfc3339()],
        )?;
        tx.commit()?;
        Ok(new_version)
    }

    /// Append to a block: `current + "\n\n" + addition`. Same history
    /// semantics as [`Store::update_block`].
    pub fn append_to_block(&self, block: BlockType, addition: &str) -> Result<i64> {
        let current = self.get_block(block)?;
        let new_content = if current.is_empty() {
            addition.to_string()
        } else {
            format!("{current}\n\n{addition}").trim().to_string()
        };
        self.update_block(block, &new_content)
    }

    /// Restore the newest history entry into the live block (with its stored
    /// version) and delete that entry. Errors when no history exists.
    pub fn rollback_block(&self, block: BlockType) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let newest: Option<(i64, String, i64)> = tx
            .query_row(
                "SELECT id, content, version FROM core_memory_history
                 WHERE block_type = ?1
                 ORDER BY id DESC
                 LIMIT 1",
                params![block.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let Some((history_id, content, version)) = newest else {
            return Err(StoreError::NoHistory(block.to_string()));
        };

        tx.execute(
            "UPDATE core_memory SET content = ?1, version = ?2, updated_at = ?3
             WHERE block_type = ?4",
            params![content, version, now_rfc3339(), block.to_string()],
        )?;
        tx.execute(
            "DELETE FROM core_memory_history WHERE id = ?1",
            params![history_id],
        )?;
        tx.commit()?;
        Ok(version)
    }

    pub fn get_system_instructions(&self) -> Result<String> {
        let conn = self.conn();
        let content: Option<String> = conn
            .query_row(
                "SELECT content FROM system_instructions WHERE id = 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(content.unwrap_or_default())
    }

    /// Admin/dashboard path only; the agent has no tool for this.
    pub fn update_system_instructions(&self, content: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO system_instructions (id, content, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
            params![content, now_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_version(store: &Store, block: BlockType) -> Option<i64> {
        store
            .conn()
            .query_row(
                "SELECT version FROM core_memory WHERE block_type = ?1",
                params![block.to_string()],
                |r| r.get(0),
            )
            .optional()
            .unwrap()
    }

    fn history_depth(store: &Store, block: BlockType) -> i64 {
        store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM core_memory_history WHERE block_type = ?1",
                params![block.to_string()],
                |r| r.get(0),
            )
            .unwrap()
    }

    #[test]
    fn first_update_creates_version_one_without_history() {
        let store = Store::open_in_memory().unwrap();
        let v = store.update_block(BlockType::User, "initial").unwrap();
        assert_eq!(v, 1);
        assert_eq!(history_depth(&store, BlockType::User), 0);
    }

    #[test]
    fn edits_bump_version_and_save_history() {
        let store = Store::open_in_memory().unwrap();
        store.update_block(BlockType::User, "v1").unwrap();
        let v = store.update_block(BlockType::User, "v2").unwrap();
        assert_eq!(v, 2);
        assert_eq!(block_version(&store, BlockType::User), Some(2));
        assert_eq!(history_depth(&store, BlockType::User), 1);
    }

    #[test]
    fn rollback_restores_prior_content_and_version() {
        let store = Store::open_in_memory().unwrap();
        store.update_block(BlockType::User, "v1").unwrap();
        store.update_block(BlockType::User, "v2").unwrap();

        let restored = store.rollback_block(BlockType::User).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(store.get_block(BlockType::User).unwrap(), "v1");
        assert_eq!(history_depth(&store, BlockType::User), 0);
    }

    #[test]
    fn repeated_rollbacks_walk_back_then_fail() {
        // update("A"); update("B"); rollback -> "A"; rollback -> original;
        // a third rollback fails.
        let store = Store::open_in_memory().unwrap();
        store.update_block(BlockType::User, "original").unwrap();
        store.update_block(BlockType::User, "A").unwrap();
        store.update_block(BlockType::User, "B").unwrap();

        store.rollback_block(BlockType::User).unwrap();
        assert_eq!(store.get_block(BlockType::User).unwrap(), "A");

        store.rollback_block(BlockType::User).unwrap();
        assert_eq!(store.get_block(BlockType::User).unwrap(), "original");

        let err = store.rollback_block(BlockType::User).unwrap_err();
        assert!(matches!(err, StoreError::NoHistory(_)));
    }

    #[test]
    fn append_joins_with_blank_line() {
        let store = Store::open_in_memory().unwrap();
        store.update_block(BlockType::Ideaspace, "first").unwrap();
        store.append_to_block(BlockType::Ideaspace, "second").unwrap();
        assert_eq!(
            store.get_block(BlockType::Ideaspace).unwrap(),
            "first\n\nsecond"
        );
    }

    #[test]
    fn append_to_empty_block_is_plain_content() {
        let store = Store::open_in_memory().unwrap();
        store.append_to_block(BlockType::Identity, "seed").unwrap();
        assert_eq!(store.get_block(BlockType::Identity).unwrap(), "seed");
    }

    #[test]
    fn unknown_block_type_is_rejected_at_parse() {
        let err = "scratchpad".parse::<BlockType>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidBlock(_)));
    }

    #[test]
    fn system_instructions_round_trip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_system_instructions().unwrap(), "");
        store.update_system_instructions("be kind").unwrap();
        assert_eq!(store.get_system_instructions().unwrap(), "be kind");

        let blocks = store.get_all_blocks().unwrap();
        assert_eq!(blocks.system_instructions, "be kind");
    }

    #[test]
    fn blocks_are_independent() {
        let store = Store::open_in_memory().unwrap();
        store.update_block(BlockType::User, "u").unwrap();
        store.update_block(BlockType::Identity, "i").unwrap();
        store.update_block(BlockType::User, "u2").unwrap();

        store.rollback_block(BlockType::User).unwrap();
        assert_eq!(store.get_block(BlockType::User).unwrap(), "u");
        assert_eq!(store.get_block(BlockType::Identity).unwrap(), "i");
        assert!(store.rollback_block(BlockType::Identity).is_err());
    }
}
