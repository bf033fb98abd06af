//! # pilot-memory
//!
//! Persistent chat history for DevPilot: an append-only log of message
//! records per user, backed by SQLite or held in memory.

pub mod history;
pub mod sqlite;

pub use history::{HistoryStore, InMemoryHistoryStore};
pub use sqlite::SqliteHistoryStore;
