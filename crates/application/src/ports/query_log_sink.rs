use async_trait::async_trait;
use sentinel_dns_domain::{DomainError, QueryRecord};

/// Persistent consumer of query records. The pipeline never awaits this on
/// the response path; a background drainer batches into it.
#[async_trait]
pub trait QueryLogSink: Send + Sync {
    async fn append_batch(&self, records: &[QueryRecord]) -> Result<(), DomainError>;
}
