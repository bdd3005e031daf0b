//! docmind-store - Durable persistence
//!
//! SQLite-backed storage for documents, chunks, index entries, and agent
//! session traces. The vector index itself lives in memory and is rebuilt
//! from the `entries` table on startup.

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;
