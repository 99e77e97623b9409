use async_trait::async_trait;
use sentinel_dns_domain::DomainError;

/// External blocklist downloader/parser. The engine only asks it to fetch a
/// list it found empty or never-updated; the refresher owns the mechanics.
#[async_trait]
pub trait BlocklistRefresher: Send + Sync {
    async fn refresh(&self, id: i64, name: &str, url: &str) -> Result<(), DomainError>;
}
