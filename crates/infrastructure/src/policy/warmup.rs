//! Background warmup of app/category blocklists that have never been
//! fetched, so enabling an app starts blocking within minutes.

use dashmap::DashMap;
use sentinel_dns_application::ports::BlocklistRefresher;
use sentinel_dns_domain::Blocklist;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const WARMUP_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Default)]
pub struct WarmupTracker {
    in_flight: Arc<DashMap<i64, ()>>,
    last_attempt: DashMap<i64, Instant>,
}

impl WarmupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire a background refresh for the list unless one is already in
    /// flight or the per-list cooldown has not elapsed.
    pub fn maybe_refresh(&self, refresher: &Arc<dyn BlocklistRefresher>, list: &Blocklist) {
        if !list.needs_warmup() {
            return;
        }
        if let Some(last) = self.last_attempt.get(&list.id) {
            if last.elapsed() < WARMUP_COOLDOWN {
                return;
            }
        }
        if self.in_flight.insert(list.id, ()).is_some() {
            return;
        }
        self.last_attempt.insert(list.id, Instant::now());

        let refresher = Arc::clone(refresher);
        let in_flight = Arc::clone(&self.in_flight);
        let (id, name, url) = (list.id, list.name.to_string(), list.url.to_string());

        debug!(list_id = id, name = %name, "Requesting blocklist warmup");
        tokio::spawn(async move {
            if let Err(e) = refresher.refresh(id, &name, &url).await {
                warn!(list_id = id, error = %e, "Blocklist warmup failed");
            }
            in_flight.remove(&id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_dns_domain::{DomainError, ListMode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BlocklistRefresher for CountingRefresher {
        async fn refresh(&self, _id: i64, _name: &str, _url: &str) -> Result<(), DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn unfetched_list(id: i64) -> Blocklist {
        Blocklist {
            id,
            name: Arc::from("Apps"),
            url: Arc::from("https://example.com/apps.txt"),
            enabled: true,
            mode: ListMode::Active,
            last_updated_at: None,
            last_rule_count: 0,
        }
    }

    #[tokio::test]
    async fn test_cooldown_prevents_repeat_requests() {
        let tracker = WarmupTracker::new();
        let refresher = Arc::new(CountingRefresher { calls: AtomicUsize::new(0) });
        let as_port: Arc<dyn BlocklistRefresher> = refresher.clone();

        let list = unfetched_list(1);
        tracker.maybe_refresh(&as_port, &list);
        tracker.maybe_refresh(&as_port, &list);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetched_lists_are_skipped() {
        let tracker = WarmupTracker::new();
        let refresher = Arc::new(CountingRefresher { calls: AtomicUsize::new(0) });
        let as_port: Arc<dyn BlocklistRefresher> = refresher.clone();

        let mut list = unfetched_list(2);
        list.last_updated_at = Some("2026-07-01 00:00:00".into());
        list.last_rule_count = 100;
        tracker.maybe_refresh(&as_port, &list);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }
}
