//! Background drainer for the per-query log channel.
//!
//! The pipeline enqueues records and never waits; this consumer batches
//! them into the sink. A failed batch is logged and dropped rather than
//! retried, so a slow store can never back-pressure the response path.

use sentinel_dns_application::ports::QueryLogSink;
use sentinel_dns_domain::QueryRecord;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const BATCH_SIZE: usize = 100;

pub struct QueryLogDrainer {
    sink: Arc<dyn QueryLogSink>,
}

impl QueryLogDrainer {
    pub fn new(sink: Arc<dyn QueryLogSink>) -> Self {
        Self { sink }
    }

    pub fn start(self, mut rx: mpsc::Receiver<QueryRecord>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Query log drainer started");

            let mut batch: Vec<QueryRecord> = Vec::with_capacity(BATCH_SIZE);
            while let Some(record) = rx.recv().await {
                batch.push(record);
                while batch.len() < BATCH_SIZE {
                    match rx.try_recv() {
                        Ok(record) => batch.push(record),
                        Err(_) => break,
                    }
                }

                if let Err(e) = self.sink.append_batch(&batch).await {
                    warn!(error = %e, dropped = batch.len(), "Query log batch failed");
                }
                batch.clear();
            }

            debug!("Query log drainer shutting down");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_dns_domain::{DomainError, ListenerTransport, QueryStatus};
    use std::sync::Mutex;

    struct CollectingSink {
        records: Mutex<Vec<QueryRecord>>,
    }

    #[async_trait]
    impl QueryLogSink for CollectingSink {
        async fn append_batch(&self, records: &[QueryRecord]) -> Result<(), DomainError> {
            self.records.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    fn record(id: u64) -> QueryRecord {
        QueryRecord {
            id,
            timestamp: "2026-07-01T00:00:00Z".into(),
            domain: "example.com".into(),
            client: None,
            client_ip: "10.0.0.1".parse().unwrap(),
            transport: ListenerTransport::Udp,
            status: QueryStatus::Permitted,
            query_type: "A".into(),
            duration_ms: 1,
            blocklist_id: None,
            answer_ips: None,
            protection_paused: false,
        }
    }

    #[tokio::test]
    async fn test_drainer_persists_enqueued_records() {
        let sink = Arc::new(CollectingSink { records: Mutex::new(Vec::new()) });
        let (tx, rx) = mpsc::channel(16);

        let handle = QueryLogDrainer::new(sink.clone()).start(rx);
        for i in 0..5 {
            tx.send(record(i)).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let stored = sink.records.lock().unwrap();
        assert_eq!(stored.len(), 5);
    }
}
