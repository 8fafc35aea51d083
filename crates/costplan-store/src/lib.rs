//! costplan store: SQLite persistence for runs, per-group results, the
//! singles behind each comparison, and group metadata.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::ResultStore;
pub use types::*;
