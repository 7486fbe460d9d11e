//! `anima-store` — the storage gateway.
//!
//! Owns every durable row: the append-only conversation log, versioned core
//! memory blocks with rollback history, the read-only system-instructions
//! singleton, archival facts, daily summaries, and cron jobs. All other
//! crates hold only values returned from here.
//!
//! One SQLite file behind a `Mutex<Connection>`; every write path runs in a
//! transaction. `setup_schema` is idempotent and runs on every start.

pub mod archival;
pub mod blocks;
pub mod cron;
pub mod db;
pub mod error;
pub mod messages;
pub mod summaries;
pub mod types;

use std::sync::Mutex;

use rusqlite::Connection;

pub use error::{Result, StoreError};
pub use messages::LoadOptions;
pub use types::*;

/// Typed access to the durable store. Shared as `Arc<Store>`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open the database file (with bounded retry) and bootstrap the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = db::open_with_retry(path)?;
        db::setup_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::setup_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }
}
