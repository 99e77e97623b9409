//! DNS-over-HTTPS upstream transport (RFC 8484).
//!
//! POST with `application/dns-message` over HTTP/1.1. The `reqwest` client
//! is owned by the dispatcher (one per bootstrap-ordering variant) so its
//! keep-alive pool is shared across queries.

use sentinel_dns_domain::DomainError;
use tokio::time::Instant;
use tracing::debug;

pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

pub struct DohTransport<'a> {
    url: &'a str,
    client: &'a reqwest::Client,
}

impl<'a> DohTransport<'a> {
    pub fn new(url: &'a str, client: &'a reqwest::Client) -> Self {
        Self { url, client }
    }

    pub async fn send(&self, message: &[u8], deadline: Instant) -> Result<Vec<u8>, DomainError> {
        debug!(url = %self.url, message_len = message.len(), "Sending DoH query");

        let response = tokio::time::timeout_at(
            deadline,
            self.client
                .post(self.url)
                .header("Content-Type", DNS_MESSAGE_CONTENT_TYPE)
                .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
                .body(message.to_vec())
                .send(),
        )
        .await
        .map_err(|_| self.timeout())?
        .map_err(|e| DomainError::UpstreamIo(format!("DoH request to {}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::UpstreamHttp(status.as_u16()));
        }

        let body = tokio::time::timeout_at(deadline, response.bytes())
            .await
            .map_err(|_| self.timeout())?
            .map_err(|e| DomainError::UpstreamIo(format!("DoH body from {}: {}", self.url, e)))?;

        debug!(url = %self.url, response_len = body.len(), "DoH response received");
        Ok(body.to_vec())
    }

    fn timeout(&self) -> DomainError {
        DomainError::UpstreamTimeout { server: self.url.to_string() }
    }
}
