mod bootstrap;
mod di;
mod server;

use clap::Parser;
use sentinel_dns_domain::config::{CliOverrides, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sentinel-dns")]
#[command(version)]
#[command(about = "Sentinel DNS - filtering forwarder for home networks")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DNS server port
    #[arg(short = 'd', long)]
    dns_port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Database path
    #[arg(long)]
    database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(
        cli.config.as_deref(),
        CliOverrides {
            dns_port: cli.dns_port,
            bind_address: cli.bind,
            database_path: cli.database,
            log_level: cli.log_level,
        },
    )?;

    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;

    if !config.server.enable_dns {
        info!("DNS engine disabled (ENABLE_DNS=false); nothing to serve");
        return Ok(());
    }

    let services = di::Services::build(&config).await?;
    server::run(&config, services).await
}
