use sentinel_dns_infrastructure::PolicyCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fast tick for the protection-pause setting.
///
/// Pausing filtering from the management surface should take effect within
/// a second, not a full refresh interval. Store hiccups keep the last
/// value.
pub struct PauseRefreshJob {
    cache: Arc<PolicyCache>,
    interval: Duration,
    shutdown: Option<CancellationToken>,
}

impl PauseRefreshJob {
    pub fn new(cache: Arc<PolicyCache>) -> Self {
        Self { cache, interval: Duration::from_secs(1), shutdown: None }
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
        info!(interval_secs = self.interval.as_secs(), "Starting protection pause refresh job");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.tick().await;

            loop {
                let tick = async {
                    interval.tick().await;
                    if let Err(e) = self.cache.refresh_pause().await {
                        debug!(error = %e, "Pause probe failed; keeping last value");
                    }
                };

                match &self.shutdown {
                    Some(token) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                info!("Protection pause refresh job stopping");
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
