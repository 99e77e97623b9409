use sentinel_dns_infrastructure::PolicyCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Periodic full snapshot rebuild.
///
/// First tick is consumed immediately so the refresh the bootstrap already
/// ran is not repeated at startup. A failed rebuild keeps the previous
/// snapshot serving.
pub struct PolicyRefreshJob {
    cache: Arc<PolicyCache>,
    interval: Duration,
    shutdown: Option<CancellationToken>,
}

impl PolicyRefreshJob {
    pub fn new(cache: Arc<PolicyCache>) -> Self {
        Self { cache, interval: Duration::from_secs(5), shutdown: None }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub async fn start(self: Arc<Self>) {
        info!(interval_secs = self.interval.as_secs(), "Starting policy refresh job");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.tick().await;

            loop {
                let tick = async {
                    interval.tick().await;
                    if let Err(e) = self.cache.refresh_now().await {
                        warn!(error = %e, "Policy refresh failed; serving previous snapshot");
                    }
                };

                match &self.shutdown {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                info!("Policy refresh job stopping");
                                break;
                            }
                            _ = tick => {}
                        }
                    }
                    None => tick.await,
                }
            }
        });
    }
}
