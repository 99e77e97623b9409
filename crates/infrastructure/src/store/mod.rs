mod query_log;
mod sqlite;

pub use query_log::SqliteQueryLogSink;
pub use sqlite::SqlitePolicyStore;
