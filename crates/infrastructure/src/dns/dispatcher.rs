//! Upstream dispatcher: one `forward` operation over the configured
//! transport.
//!
//! Encapsulates bootstrap hostname resolution, per-transport deadlines,
//! and the single DoH ordering retry. Never retries across transports.

use crate::dns::transport::bootstrap;
use crate::dns::transport::{TcpTransport, UdpTransport};
use async_trait::async_trait;
#[cfg(feature = "dns-over-https")]
use dashmap::DashMap;
use sentinel_dns_application::ports::Forwarder;
use sentinel_dns_domain::{DomainError, ForwardOptions, UpstreamConfig};
#[cfg(feature = "dns-over-https")]
use std::net::IpAddr;
use std::net::SocketAddr;
#[cfg(feature = "dns-over-https")]
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Floor for the DoH ordering retry budget.
#[cfg(feature = "dns-over-https")]
const RETRY_MIN_BUDGET: Duration = Duration::from_millis(250);

pub struct UpstreamDispatcher {
    options: ForwardOptions,
    /// DoH clients keyed by address-family preference; each keeps its own
    /// keep-alive pool.
    #[cfg(feature = "dns-over-https")]
    doh_clients: DashMap<bool, reqwest::Client>,
}

impl UpstreamDispatcher {
    pub fn new(options: ForwardOptions) -> Self {
        Self {
            options,
            #[cfg(feature = "dns-over-https")]
            doh_clients: DashMap::new(),
        }
    }

    pub fn options(&self) -> &ForwardOptions {
        &self.options
    }

    async fn resolve_upstream(
        &self,
        host: &str,
        port: u16,
        deadline: Instant,
    ) -> Result<SocketAddr, DomainError> {
        let addrs = bootstrap::resolve_host(
            host,
            &self.options.bootstrap_dns,
            self.options.doh_prefer_ipv4,
            deadline,
        )
        .await?;
        addrs
            .first()
            .map(|&ip| SocketAddr::new(ip, port))
            .ok_or_else(|| DomainError::UpstreamIo(format!("no addresses for {}", host)))
    }

    #[cfg(feature = "dns-over-https")]
    fn doh_client(&self, prefer_ipv4: bool) -> Result<reqwest::Client, DomainError> {
        if let Some(client) = self.doh_clients.get(&prefer_ipv4) {
            return Ok(client.clone());
        }

        let resolver = BootstrapResolver {
            bootstrap: Arc::new(self.options.bootstrap_dns.clone()),
            prefer_ipv4,
        };
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .http1_only()
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(30))
            .dns_resolver(Arc::new(resolver))
            .build()
            .map_err(|e| DomainError::UpstreamIo(format!("DoH client build: {}", e)))?;

        self.doh_clients.insert(prefer_ipv4, client.clone());
        Ok(client)
    }

    #[cfg(feature = "dns-over-https")]
    async fn forward_doh(
        &self,
        url: &str,
        message: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, DomainError> {
        use crate::dns::transport::https::DohTransport;

        let client = self.doh_client(self.options.doh_prefer_ipv4)?;
        let result = DohTransport::new(url, &client).send(message, deadline).await;

        // A transport-level failure with IPv4-first ordering gets one more
        // attempt with the default ordering, inside what remains of the
        // deadline (floored so the retry is not stillborn).
        match result {
            Err(ref e) if self.options.doh_prefer_ipv4 && !e.is_timeout() && !e.is_http() => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let retry_deadline = Instant::now() + remaining.max(RETRY_MIN_BUDGET);
                warn!(url = %url, error = %e, "DoH failed with IPv4-first ordering, retrying with default ordering");

                let fallback = self.doh_client(false)?;
                DohTransport::new(url, &fallback).send(message, retry_deadline).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl Forwarder for UpstreamDispatcher {
    async fn forward(
        &self,
        upstream: &UpstreamConfig,
        message: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, DomainError> {
        debug!(upstream = %upstream.describe(), transport = upstream.transport_name(), "Forwarding query");

        match upstream {
            UpstreamConfig::Udp { host, port } => {
                let addr = self.resolve_upstream(host, *port, deadline).await?;
                UdpTransport::new(addr).send(message, deadline).await
            }
            UpstreamConfig::Tcp { host, port } => {
                let addr = self.resolve_upstream(host, *port, deadline).await?;
                TcpTransport::new(addr).send(message, deadline).await
            }
            #[cfg(feature = "dns-over-rustls")]
            UpstreamConfig::Dot { host, port } => {
                use crate::dns::transport::tls::TlsTransport;
                let addr = self.resolve_upstream(host, *port, deadline).await?;
                TlsTransport::new(addr, host.clone()).send(message, deadline).await
            }
            #[cfg(not(feature = "dns-over-rustls"))]
            UpstreamConfig::Dot { host, port } => {
                warn!("TLS feature not enabled, falling back to TCP for {}:{}", host, port);
                let addr = self.resolve_upstream(host, *port, deadline).await?;
                TcpTransport::new(addr).send(message, deadline).await
            }
            #[cfg(feature = "dns-over-https")]
            UpstreamConfig::Doh { url } => self.forward_doh(url, message, deadline).await,
            #[cfg(not(feature = "dns-over-https"))]
            UpstreamConfig::Doh { url } => Err(DomainError::InvalidUpstream(format!(
                "HTTPS feature not enabled, cannot use {}",
                url
            ))),
        }
    }
}

/// Custom `reqwest` resolver backed by the bootstrap literals, so the DoH
/// hostname never depends on the very DNS service we provide.
#[cfg(feature = "dns-over-https")]
struct BootstrapResolver {
    bootstrap: Arc<Vec<IpAddr>>,
    prefer_ipv4: bool,
}

#[cfg(feature = "dns-over-https")]
impl reqwest::dns::Resolve for BootstrapResolver {
    fn resolve(&self, name: reqwest::dns::Name) -> reqwest::dns::Resolving {
        let bootstrap = Arc::clone(&self.bootstrap);
        let prefer_ipv4 = self.prefer_ipv4;
        Box::pin(async move {
            let deadline = Instant::now() + Duration::from_secs(5);
            let addrs = bootstrap::resolve_host(name.as_str(), &bootstrap, prefer_ipv4, deadline)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
            let socket_addrs: Vec<SocketAddr> =
                addrs.into_iter().map(|ip| SocketAddr::new(ip, 0)).collect();
            Ok(Box::new(socket_addrs.into_iter()) as reqwest::dns::Addrs)
        })
    }
}
