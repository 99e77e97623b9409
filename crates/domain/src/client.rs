use crate::schedule::Schedule;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// A device or subnet the server applies per-client policy to.
///
/// At most one of `address` / `subnet` is set: an exact IP makes this an
/// exact-match client, a CIDR makes it a subnet client.
#[derive(Debug, Clone)]
pub struct ClientProfile {
    pub id: i64,
    pub name: Arc<str>,
    pub address: Option<IpAddr>,
    pub subnet: Option<IpNetwork>,
    pub policy: ClientPolicy,
}

/// Per-client policy flags and custom selections, stored as one JSON
/// profile column and decoded strictly at refresh time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPolicy {
    #[serde(default = "default_true")]
    pub use_global_blocklists: bool,
    #[serde(default = "default_true")]
    pub use_global_categories: bool,
    #[serde(default = "default_true")]
    pub use_global_apps: bool,
    #[serde(default)]
    pub internet_paused: bool,
    #[serde(default)]
    pub assigned_blocklists: Vec<i64>,
    #[serde(default)]
    pub blocked_categories: Vec<String>,
    #[serde(default)]
    pub blocked_apps: Vec<String>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            use_global_blocklists: true,
            use_global_categories: true,
            use_global_apps: true,
            internet_paused: false,
            assigned_blocklists: Vec::new(),
            blocked_categories: Vec::new(),
            blocked_apps: Vec::new(),
            schedules: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl ClientProfile {
    pub fn is_exact(&self) -> bool {
        self.address.is_some()
    }

    pub fn is_subnet(&self) -> bool {
        self.address.is_none() && self.subnet.is_some()
    }

    /// CIDR match, restricted to the query address's family.
    pub fn subnet_contains(&self, ip: IpAddr) -> bool {
        match self.subnet {
            Some(net) => {
                let same_family = matches!(
                    (net, ip),
                    (IpNetwork::V4(_), IpAddr::V4(_)) | (IpNetwork::V6(_), IpAddr::V6(_))
                );
                same_family && net.contains(ip)
            }
            None => false,
        }
    }

    pub fn prefix_len(&self) -> Option<u8> {
        self.subnet.map(|net| net.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet_client(id: i64, cidr: &str) -> ClientProfile {
        ClientProfile {
            id,
            name: Arc::from(format!("client-{}", id).as_str()),
            address: None,
            subnet: Some(cidr.parse().unwrap()),
            policy: ClientPolicy::default(),
        }
    }

    #[test]
    fn test_subnet_contains_same_family_only() {
        let c = subnet_client(1, "10.0.0.0/8");
        assert!(c.subnet_contains("10.1.2.3".parse().unwrap()));
        assert!(!c.subnet_contains("192.168.1.1".parse().unwrap()));
        assert!(!c.subnet_contains("fd00::1".parse().unwrap()));
    }

    #[test]
    fn test_v6_subnet() {
        let c = subnet_client(2, "fd00::/8");
        assert!(c.subnet_contains("fd12::9".parse().unwrap()));
        assert!(!c.subnet_contains("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_policy_defaults_inherit_global() {
        let policy: ClientPolicy = serde_json::from_str("{}").unwrap();
        assert!(policy.use_global_blocklists);
        assert!(policy.use_global_categories);
        assert!(policy.use_global_apps);
        assert!(!policy.internet_paused);
        assert!(policy.schedules.is_empty());
    }
}
