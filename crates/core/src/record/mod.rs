//! Durable torrent records, one per info hash.

mod sqlite;
mod store;

pub use sqlite::SqliteRecordStore;
pub use store::*;
