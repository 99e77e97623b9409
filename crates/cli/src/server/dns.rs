use crate::di::Services;
use sentinel_dns_domain::Config;
use sentinel_dns_infrastructure::dns::server::spawn_listeners;
use sentinel_dns_jobs::{JobRunner, PauseRefreshJob, PolicyRefreshJob};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Grace period for in-flight queries after the listeners stop.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

pub async fn run(config: &Config, services: Services) -> anyhow::Result<()> {
    let listener_shutdown = CancellationToken::new();
    let jobs_shutdown = CancellationToken::new();

    let handles = spawn_listeners(
        Arc::clone(&services.pipeline),
        config.server.bind_mode,
        &config.server.dns_host,
        config.server.dns_port,
        listener_shutdown.clone(),
    )?;

    JobRunner::new()
        .with_policy_refresh(PolicyRefreshJob::new(Arc::clone(&services.cache)))
        .with_pause_refresh(PauseRefreshJob::new(Arc::clone(&services.cache)))
        .with_shutdown_token(jobs_shutdown.clone())
        .start()
        .await;

    info!(
        host = %config.server.dns_host,
        port = config.server.dns_port,
        mode = ?config.server.bind_mode,
        "DNS server ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Stop accepting first, then the refreshers, then drain in-flight
    // queries briefly before the process exits.
    listener_shutdown.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    jobs_shutdown.cancel();
    tokio::time::sleep(DRAIN_GRACE).await;
    services.drainer.abort();

    let counters = services.counters.snapshot();
    info!(total_queries = counters.total_queries, "Shutdown complete");
    Ok(())
}
