use std::net::IpAddr;
use std::sync::Arc;

/// Outcome recorded for every served query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Permitted,
    Blocked,
    ShadowBlocked,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Permitted => "PERMITTED",
            QueryStatus::Blocked => "BLOCKED",
            QueryStatus::ShadowBlocked => "SHADOW_BLOCKED",
        }
    }
}

/// Listener transport a query arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerTransport {
    Udp,
    Tcp,
}

impl ListenerTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerTransport::Udp => "udp",
            ListenerTransport::Tcp => "tcp",
        }
    }
}

/// One per-query log record, enqueued by the pipeline and persisted by the
/// background drainer. Never awaited on the response path.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub id: u64,
    pub timestamp: String,
    pub domain: String,
    pub client: Option<Arc<str>>,
    pub client_ip: IpAddr,
    pub transport: ListenerTransport,
    pub status: QueryStatus,
    pub query_type: String,
    pub duration_ms: u64,
    pub blocklist_id: Option<String>,
    pub answer_ips: Option<Vec<IpAddr>>,
    pub protection_paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(QueryStatus::Permitted.as_str(), "PERMITTED");
        assert_eq!(QueryStatus::Blocked.as_str(), "BLOCKED");
        assert_eq!(QueryStatus::ShadowBlocked.as_str(), "SHADOW_BLOCKED");
    }

    #[test]
    fn test_transport_labels() {
        assert_eq!(ListenerTransport::Udp.as_str(), "udp");
        assert_eq!(ListenerTransport::Tcp.as_str(), "tcp");
    }
}
