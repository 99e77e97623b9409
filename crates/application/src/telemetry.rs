//! Runtime counters read by observability endpoints.
//!
//! `last_query_at` is tracked monotonically (milliseconds since process
//! start) and converted to wall-clock only when a snapshot is read, so
//! clock steps never reorder it.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sentinel_dns_domain::ListenerTransport;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Tailscale CGNAT range `100.64.0.0/10`.
fn is_tailscale_v4(ip: &std::net::Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (64..128).contains(&octets[1])
}

/// Tailscale ULA range `fd7a:115c:a1e0::/48`.
fn is_tailscale_v6(ip: &std::net::Ipv6Addr) -> bool {
    ip.octets()[..6] == [0xfd, 0x7a, 0x11, 0x5c, 0xa1, 0xe0]
}

pub struct RuntimeCounters {
    started_at: DateTime<Utc>,
    start_instant: Instant,
    /// Milliseconds since start of the most recent query, +1 so zero means
    /// "never".
    last_query_offset_ms: AtomicU64,
    last_client: Mutex<Option<(IpAddr, ListenerTransport)>>,
    last_forward_error: Mutex<Option<String>>,
    total_queries: AtomicU64,
    tailscale_queries: AtomicU64,
    tailscale_v4_queries: AtomicU64,
    tailscale_v6_queries: AtomicU64,
}

impl RuntimeCounters {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            start_instant: Instant::now(),
            last_query_offset_ms: AtomicU64::new(0),
            last_client: Mutex::new(None),
            last_forward_error: Mutex::new(None),
            total_queries: AtomicU64::new(0),
            tailscale_queries: AtomicU64::new(0),
            tailscale_v4_queries: AtomicU64::new(0),
            tailscale_v6_queries: AtomicU64::new(0),
        }
    }

    pub fn record_query(&self, client_ip: IpAddr, transport: ListenerTransport) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);

        match client_ip {
            IpAddr::V4(v4) if is_tailscale_v4(&v4) => {
                self.tailscale_queries.fetch_add(1, Ordering::Relaxed);
                self.tailscale_v4_queries.fetch_add(1, Ordering::Relaxed);
            }
            IpAddr::V6(v6) if is_tailscale_v6(&v6) => {
                self.tailscale_queries.fetch_add(1, Ordering::Relaxed);
                self.tailscale_v6_queries.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        let offset = self.start_instant.elapsed().as_millis() as u64 + 1;
        self.last_query_offset_ms.store(offset, Ordering::Relaxed);
        if let Ok(mut last) = self.last_client.lock() {
            *last = Some((client_ip, transport));
        }
    }

    pub fn record_forward_error(&self, transport: &str, error: &str) {
        if let Ok(mut last) = self.last_forward_error.lock() {
            *last = Some(format!("{}: {}", transport, error));
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let offset = self.last_query_offset_ms.load(Ordering::Relaxed);
        let last_query_at = (offset > 0)
            .then(|| self.started_at + ChronoDuration::milliseconds(offset as i64 - 1));
        let (last_client_ip, last_transport) = self
            .last_client
            .lock()
            .ok()
            .and_then(|guard| *guard)
            .map(|(ip, transport)| (Some(ip), Some(transport)))
            .unwrap_or((None, None));

        CountersSnapshot {
            started_at: self.started_at,
            last_query_at,
            last_client_ip,
            last_transport,
            last_forward_error: self.last_forward_error.lock().ok().and_then(|g| g.clone()),
            total_queries: self.total_queries.load(Ordering::Relaxed),
            tailscale_queries: self.tailscale_queries.load(Ordering::Relaxed),
            tailscale_v4_queries: self.tailscale_v4_queries.load(Ordering::Relaxed),
            tailscale_v6_queries: self.tailscale_v6_queries.load(Ordering::Relaxed),
        }
    }
}

impl Default for RuntimeCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CountersSnapshot {
    pub started_at: DateTime<Utc>,
    pub last_query_at: Option<DateTime<Utc>>,
    pub last_client_ip: Option<IpAddr>,
    pub last_transport: Option<ListenerTransport>,
    pub last_forward_error: Option<String>,
    pub total_queries: u64,
    pub tailscale_queries: u64,
    pub tailscale_v4_queries: u64,
    pub tailscale_v6_queries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_and_last_client() {
        let counters = RuntimeCounters::new();
        counters.record_query("192.168.1.5".parse().unwrap(), ListenerTransport::Udp);
        counters.record_query("192.168.1.6".parse().unwrap(), ListenerTransport::Tcp);

        let snap = counters.snapshot();
        assert_eq!(snap.total_queries, 2);
        assert_eq!(snap.tailscale_queries, 0);
        assert_eq!(snap.last_client_ip, Some("192.168.1.6".parse().unwrap()));
        assert_eq!(snap.last_transport, Some(ListenerTransport::Tcp));
        assert!(snap.last_query_at.is_some());
    }

    #[test]
    fn test_tailscale_v4_range() {
        let counters = RuntimeCounters::new();
        counters.record_query("100.64.0.1".parse().unwrap(), ListenerTransport::Udp);
        counters.record_query("100.127.255.254".parse().unwrap(), ListenerTransport::Udp);
        counters.record_query("100.128.0.1".parse().unwrap(), ListenerTransport::Udp);
        counters.record_query("100.63.255.255".parse().unwrap(), ListenerTransport::Udp);

        let snap = counters.snapshot();
        assert_eq!(snap.tailscale_queries, 2);
        assert_eq!(snap.tailscale_v4_queries, 2);
        assert_eq!(snap.tailscale_v6_queries, 0);
    }

    #[test]
    fn test_tailscale_v6_range() {
        let counters = RuntimeCounters::new();
        counters.record_query("fd7a:115c:a1e0::1".parse().unwrap(), ListenerTransport::Udp);
        counters.record_query("fd7a:115c:a1e1::1".parse().unwrap(), ListenerTransport::Udp);

        let snap = counters.snapshot();
        assert_eq!(snap.tailscale_v6_queries, 1);
    }

    #[test]
    fn test_no_queries_means_no_last_query() {
        let snap = RuntimeCounters::new().snapshot();
        assert!(snap.last_query_at.is_none());
        assert!(snap.last_client_ip.is_none());
    }

    #[test]
    fn test_forward_error_recorded() {
        let counters = RuntimeCounters::new();
        counters.record_forward_error("doh", "Upstream timeout: https://dns.google/dns-query");
        let snap = counters.snapshot();
        assert!(snap.last_forward_error.unwrap().starts_with("doh:"));
    }
}
