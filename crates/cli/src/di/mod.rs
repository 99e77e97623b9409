//! Wiring of stores, caches, dispatcher, and the query pipeline.

use crate::bootstrap;
use sentinel_dns_application::ports::Forwarder;
use sentinel_dns_application::RuntimeCounters;
use sentinel_dns_domain::{Config, UpstreamConfig};
use sentinel_dns_infrastructure::{
    PolicyCache, QueryLogDrainer, QueryPipeline, SqlitePolicyStore, SqliteQueryLogSink,
    UpstreamDispatcher,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Query records buffered between the pipeline and the drainer.
const LOG_CHANNEL_CAPACITY: usize = 1024;

pub struct Services {
    pub cache: Arc<PolicyCache>,
    pub pipeline: Arc<QueryPipeline>,
    pub counters: Arc<RuntimeCounters>,
    pub drainer: tokio::task::JoinHandle<()>,
}

impl Services {
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let pool = bootstrap::init_database(&config.database).await?;

        let default_upstream = match &config.upstream.default {
            Some(spec) => UpstreamConfig::from_host_port(spec)?,
            None => UpstreamConfig::Udp { host: "1.1.1.1".into(), port: 53 },
        };
        info!(upstream = %default_upstream.describe(), "Default upstream configured");

        let store = Arc::new(SqlitePolicyStore::new(pool.clone()));
        // The external blocklist refresher is wired by the management
        // process; standalone runs serve without app-list warmup.
        let cache = Arc::new(PolicyCache::new(store, default_upstream, None));

        // Caches come up before the listeners bind; a failed first refresh
        // degrades to the empty snapshot rather than aborting startup.
        if let Err(e) = cache.refresh_now().await {
            warn!(error = %e, "Initial policy refresh failed; starting with empty policy");
        }

        let dispatcher: Arc<dyn Forwarder> = Arc::new(UpstreamDispatcher::new(config.forward.clone()));
        let counters = Arc::new(RuntimeCounters::new());

        let (log_tx, log_rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let sink = Arc::new(SqliteQueryLogSink::new(pool));
        let drainer = QueryLogDrainer::new(sink).start(log_rx);

        let pipeline = Arc::new(QueryPipeline::new(
            Arc::clone(&cache),
            dispatcher,
            Arc::clone(&counters),
            log_tx,
            config.forward.clone(),
        ));

        Ok(Self { cache, pipeline, counters, drainer })
    }
}
