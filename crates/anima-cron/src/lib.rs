//! `anima-cron` — scheduled agent turns.
//!
//! Jobs live in the store; the engine holds an in-memory (job, next-fire)
//! list rebuilt on every CRUD notification, polls it once a second, and
//! executes due jobs as synthetic turns on the main conversation thread via
//! a [`JobRunner`]. Outcomes are recorded on the job row; one-time jobs are
//! paused after a successful run.

pub mod engine;
pub mod error;
pub mod schedule;

pub use engine::{execute_job, CronEngine, CronHandle, JobRunner};
pub use error::{Result, SchedulerError};
pub use schedule::{next_fire, parse_time};
