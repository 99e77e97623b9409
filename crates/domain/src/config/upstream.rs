use crate::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where forwarded queries go. Stored as the `dns_settings` row; falls back
/// to the `UPSTREAM_DNS` environment default when no row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UpstreamConfig {
    Udp { host: String, port: u16 },
    Tcp { host: String, port: u16 },
    Dot { host: String, port: u16 },
    Doh { url: String },
}

impl UpstreamConfig {
    /// Parse the `host[:port]` shorthand used by `UPSTREAM_DNS`. Bracketed
    /// IPv6 literals are accepted (`[2606:4700:4700::1111]:53`).
    pub fn from_host_port(spec: &str) -> Result<Self, DomainError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(DomainError::InvalidUpstream("empty upstream spec".into()));
        }

        if let Some(rest) = spec.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| DomainError::InvalidUpstream(format!("unclosed bracket: {}", spec)))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p
                    .parse()
                    .map_err(|_| DomainError::InvalidUpstream(format!("bad port in {}", spec)))?,
                None => 53,
            };
            return Ok(UpstreamConfig::Udp { host: host.to_string(), port });
        }

        // Unbracketed IPv6 literals carry multiple colons and no port.
        if spec.matches(':').count() > 1 {
            return Ok(UpstreamConfig::Udp { host: spec.to_string(), port: 53 });
        }

        match spec.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| DomainError::InvalidUpstream(format!("bad port in {}", spec)))?;
                Ok(UpstreamConfig::Udp { host: host.to_string(), port })
            }
            None => Ok(UpstreamConfig::Udp { host: spec.to_string(), port: 53 }),
        }
    }

    pub fn transport_name(&self) -> &'static str {
        match self {
            UpstreamConfig::Udp { .. } => "udp",
            UpstreamConfig::Tcp { .. } => "tcp",
            UpstreamConfig::Dot { .. } => "dot",
            UpstreamConfig::Doh { .. } => "doh",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            UpstreamConfig::Udp { host, port }
            | UpstreamConfig::Tcp { host, port }
            | UpstreamConfig::Dot { host, port } => format!("{}:{}", host, port),
            UpstreamConfig::Doh { url } => url.clone(),
        }
    }
}

/// Per-transport deadlines and bootstrap options for the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardOptions {
    #[serde(default = "default_udp_timeout_ms")]
    pub udp_timeout_ms: u64,
    #[serde(default = "default_tcp_timeout_ms")]
    pub tcp_timeout_ms: u64,
    #[serde(default = "default_dot_timeout_ms")]
    pub dot_timeout_ms: u64,
    #[serde(default = "default_doh_timeout_ms")]
    pub doh_timeout_ms: u64,
    /// IP-literal resolvers used to look up DoT/DoH hostnames.
    #[serde(default)]
    pub bootstrap_dns: Vec<std::net::IpAddr>,
    #[serde(default)]
    pub doh_prefer_ipv4: bool,
    /// Resolve blocked queries upstream to enrich telemetry only.
    #[serde(default)]
    pub shadow_resolve_blocked: bool,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            udp_timeout_ms: default_udp_timeout_ms(),
            tcp_timeout_ms: default_tcp_timeout_ms(),
            dot_timeout_ms: default_dot_timeout_ms(),
            doh_timeout_ms: default_doh_timeout_ms(),
            bootstrap_dns: Vec::new(),
            doh_prefer_ipv4: false,
            shadow_resolve_blocked: false,
        }
    }
}

/// Floor applied to every configured timeout.
pub const MIN_TIMEOUT_MS: u64 = 250;

impl ForwardOptions {
    pub fn timeout_for(&self, upstream: &UpstreamConfig) -> Duration {
        let ms = match upstream {
            UpstreamConfig::Udp { .. } => self.udp_timeout_ms,
            UpstreamConfig::Tcp { .. } => self.tcp_timeout_ms,
            UpstreamConfig::Dot { .. } => self.dot_timeout_ms,
            UpstreamConfig::Doh { .. } => self.doh_timeout_ms,
        };
        Duration::from_millis(ms.max(MIN_TIMEOUT_MS))
    }

    /// Parse a comma/whitespace-separated bootstrap list; non-literals are
    /// ignored.
    pub fn parse_bootstrap(spec: &str) -> Vec<std::net::IpAddr> {
        spec.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.parse().ok())
            .collect()
    }
}

fn default_udp_timeout_ms() -> u64 {
    2000
}

fn default_tcp_timeout_ms() -> u64 {
    4000
}

fn default_dot_timeout_ms() -> u64 {
    4000
}

fn default_doh_timeout_ms() -> u64 {
    15000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_port_shorthand() {
        assert_eq!(
            UpstreamConfig::from_host_port("9.9.9.9").unwrap(),
            UpstreamConfig::Udp { host: "9.9.9.9".into(), port: 53 }
        );
        assert_eq!(
            UpstreamConfig::from_host_port("8.8.8.8:5353").unwrap(),
            UpstreamConfig::Udp { host: "8.8.8.8".into(), port: 5353 }
        );
    }

    #[test]
    fn test_host_port_ipv6() {
        assert_eq!(
            UpstreamConfig::from_host_port("[2606:4700:4700::1111]:853").unwrap(),
            UpstreamConfig::Udp { host: "2606:4700:4700::1111".into(), port: 853 }
        );
        assert_eq!(
            UpstreamConfig::from_host_port("2606:4700:4700::1111").unwrap(),
            UpstreamConfig::Udp { host: "2606:4700:4700::1111".into(), port: 53 }
        );
    }

    #[test]
    fn test_host_port_rejects_garbage() {
        assert!(UpstreamConfig::from_host_port("").is_err());
        assert!(UpstreamConfig::from_host_port("host:notaport").is_err());
    }

    #[test]
    fn test_settings_json_shapes() {
        let dot: UpstreamConfig =
            serde_json::from_str(r#"{"type":"dot","host":"1.1.1.1","port":853}"#).unwrap();
        assert_eq!(dot, UpstreamConfig::Dot { host: "1.1.1.1".into(), port: 853 });

        let doh: UpstreamConfig =
            serde_json::from_str(r#"{"type":"doh","url":"https://dns.google/dns-query"}"#).unwrap();
        assert_eq!(doh.transport_name(), "doh");
    }

    #[test]
    fn test_timeout_floor() {
        let opts = ForwardOptions { udp_timeout_ms: 10, ..Default::default() };
        let upstream = UpstreamConfig::Udp { host: "1.1.1.1".into(), port: 53 };
        assert_eq!(opts.timeout_for(&upstream), Duration::from_millis(MIN_TIMEOUT_MS));
    }

    #[test]
    fn test_parse_bootstrap_ignores_non_literals() {
        let parsed = ForwardOptions::parse_bootstrap("1.1.1.1, dns.google 2620:fe::fe");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&"1.1.1.1".parse().unwrap()));
        assert!(parsed.contains(&"2620:fe::fe".parse().unwrap()));
    }
}
