//! Sentinel DNS infrastructure: store adapters, policy refresh, upstream
//! transports, and the serving loop.
pub mod database;
pub mod dns;
pub mod policy;
pub mod store;
pub mod telemetry;

pub use dns::{QueryPipeline, UpstreamDispatcher};
pub use policy::PolicyCache;
pub use store::{SqlitePolicyStore, SqliteQueryLogSink};
pub use telemetry::QueryLogDrainer;
