mod database;
mod errors;
mod logging;
mod root;
mod server;
mod upstream;

pub use database::DatabaseConfig;
pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config, UpstreamSection};
pub use server::{BindMode, ServerConfig};
pub use upstream::{ForwardOptions, UpstreamConfig, MIN_TIMEOUT_MS};
