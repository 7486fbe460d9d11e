pub mod chat;
pub mod cron;
pub mod health;
pub mod memory;
pub mod messages;
