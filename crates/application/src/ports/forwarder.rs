use async_trait::async_trait;
use sentinel_dns_domain::{DomainError, UpstreamConfig};
use tokio::time::Instant;

/// Forwards a pre-serialized DNS message to an upstream and returns the raw
/// response bytes. Implementations encapsulate transport selection,
/// bootstrap resolution, and retries; they never retry across transports.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        upstream: &UpstreamConfig,
        message: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, DomainError>;
}
