//! DNS-over-TLS upstream transport (RFC 7858).
//!
//! The client config is built once and shared; rustls session resumption
//! keeps repeat handshakes cheap. Connections are per-query: the stream is
//! dropped on every exit path, so a timeout never leaks a socket.

use super::tcp::{read_framed, write_framed};
use rustls::pki_types::ServerName;
use sentinel_dns_domain::DomainError;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

pub struct TlsTransport {
    server_addr: SocketAddr,
    /// SNI / certificate name; an IP literal is accepted too.
    hostname: String,
}

impl TlsTransport {
    pub fn new(server_addr: SocketAddr, hostname: String) -> Self {
        Self { server_addr, hostname }
    }

    pub async fn send(&self, message: &[u8], deadline: Instant) -> Result<Vec<u8>, DomainError> {
        let connector = tokio_rustls::TlsConnector::from(SHARED_TLS_CONFIG.clone());

        let server_name = ServerName::try_from(self.hostname.clone()).map_err(|e| {
            DomainError::InvalidDomainName(format!("TLS hostname '{}': {}", self.hostname, e))
        })?;

        let tcp_stream = tokio::time::timeout_at(deadline, TcpStream::connect(self.server_addr))
            .await
            .map_err(|_| self.timeout())?
            .map_err(|e| DomainError::UpstreamIo(format!("connect {}: {}", self.server_addr, e)))?;

        let mut tls_stream =
            tokio::time::timeout_at(deadline, connector.connect(server_name, tcp_stream))
                .await
                .map_err(|_| self.timeout())?
                .map_err(|e| {
                    DomainError::UpstreamIo(format!("TLS handshake {}: {}", self.server_addr, e))
                })?;

        debug!(server = %self.server_addr, hostname = %self.hostname, "TLS connection established");

        tokio::time::timeout_at(deadline, write_framed(&mut tls_stream, message))
            .await
            .map_err(|_| self.timeout())??;

        let response = tokio::time::timeout_at(deadline, read_framed(&mut tls_stream))
            .await
            .map_err(|_| self.timeout())??;

        debug!(server = %self.server_addr, response_len = response.len(), "TLS response received");
        Ok(response)
    }

    fn timeout(&self) -> DomainError {
        DomainError::UpstreamTimeout { server: format!("{} ({})", self.server_addr, self.hostname) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_config_builds() {
        let _config = &*SHARED_TLS_CONFIG;
    }

    #[test]
    fn test_server_name_accepts_hostname_and_literal() {
        assert!(ServerName::try_from("cloudflare-dns.com".to_string()).is_ok());
        assert!(ServerName::try_from("1.1.1.1".to_string()).is_ok());
    }
}
