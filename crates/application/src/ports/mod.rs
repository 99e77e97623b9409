mod blocklist_refresher;
mod forwarder;
mod policy_store;
mod query_log_sink;

pub use blocklist_refresher::BlocklistRefresher;
pub use forwarder::Forwarder;
pub use policy_store::{setting_keys, PolicyStore, RuleQueryScope};
pub use query_log_sink::QueryLogSink;
