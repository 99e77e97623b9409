use serde::{Deserialize, Serialize};

use super::database::DatabaseConfig;
use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use super::upstream::{ForwardOptions, MIN_TIMEOUT_MS};

/// Fallback upstream used when the store carries no `dns_settings` row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamSection {
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamSection,

    #[serde(default)]
    pub forward: ForwardOptions,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("sentinel-dns.toml").exists() {
            Self::from_file("sentinel-dns.toml")?
        } else if std::path::Path::new("/etc/sentinel-dns/config.toml").exists() {
            Self::from_file("/etc/sentinel-dns/config.toml")?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Environment always wins over the file; the lookup is injected so
    /// tests can exercise the mapping without touching the process env.
    pub fn apply_env_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = get("DNS_HOST").or_else(|| get("HOST")) {
            self.server.dns_host = host;
        }
        if let Some(port) = get("DNS_PORT").or_else(|| get("PORT")).and_then(|v| v.parse().ok()) {
            self.server.dns_port = port;
        }
        if let Some(enabled) = get("ENABLE_DNS").map(|v| parse_bool(&v)) {
            self.server.enable_dns = enabled;
        }
        if let Some(upstream) = get("UPSTREAM_DNS") {
            self.upstream.default = Some(upstream);
        }
        if let Some(bootstrap) = get("DNS_FORWARD_BOOTSTRAP_DNS") {
            self.forward.bootstrap_dns = ForwardOptions::parse_bootstrap(&bootstrap);
        }
        for (key, slot) in [
            ("DNS_FORWARD_UDP_TIMEOUT_MS", &mut self.forward.udp_timeout_ms),
            ("DNS_FORWARD_TCP_TIMEOUT_MS", &mut self.forward.tcp_timeout_ms),
            ("DNS_FORWARD_DOT_TIMEOUT_MS", &mut self.forward.dot_timeout_ms),
            ("DNS_FORWARD_DOH_TIMEOUT_MS", &mut self.forward.doh_timeout_ms),
        ] {
            if let Some(ms) = get(key).and_then(|v| v.parse::<u64>().ok()) {
                *slot = ms.max(MIN_TIMEOUT_MS);
            }
        }
        if let Some(prefer) = get("DNS_FORWARD_DOH_PREFER_IPV4").map(|v| parse_bool(&v)) {
            self.forward.doh_prefer_ipv4 = prefer;
        }
        if let Some(shadow) = get("SHADOW_RESOLVE_BLOCKED").map(|v| parse_bool(&v)) {
            self.forward.shadow_resolve_blocked = shadow;
        }
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.dns_port {
            self.server.dns_port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.dns_host = bind;
        }
        if let Some(db) = overrides.database_path {
            self.database.path = db;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.dns_port == 0 {
            return Err(ConfigError::Validation("DNS port cannot be 0".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub dns_port: Option<u16>,
    pub bind_address: Option<String>,
    pub database_path: Option<String>,
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_env_overrides_listener() {
        let vars = env(&[("DNS_HOST", "127.0.0.1"), ("DNS_PORT", "5300")]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).cloned());
        assert_eq!(config.server.dns_host, "127.0.0.1");
        assert_eq!(config.server.dns_port, 5300);
    }

    #[test]
    fn test_dns_host_beats_plain_host() {
        let vars = env(&[("HOST", "0.0.0.0"), ("DNS_HOST", "::")]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).cloned());
        assert_eq!(config.server.dns_host, "::");
    }

    #[test]
    fn test_enable_dns_false() {
        let vars = env(&[("ENABLE_DNS", "false")]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).cloned());
        assert!(!config.server.enable_dns);
    }

    #[test]
    fn test_timeout_overrides_clamped() {
        let vars = env(&[("DNS_FORWARD_UDP_TIMEOUT_MS", "50")]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).cloned());
        assert_eq!(config.forward.udp_timeout_ms, MIN_TIMEOUT_MS);
    }

    #[test]
    fn test_bootstrap_and_flags() {
        let vars = env(&[
            ("DNS_FORWARD_BOOTSTRAP_DNS", "1.1.1.1 9.9.9.9,ignored.example"),
            ("DNS_FORWARD_DOH_PREFER_IPV4", "true"),
            ("SHADOW_RESOLVE_BLOCKED", "1"),
        ]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).cloned());
        assert_eq!(config.forward.bootstrap_dns.len(), 2);
        assert!(config.forward.doh_prefer_ipv4);
        assert!(config.forward.shadow_resolve_blocked);
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let mut config = Config::default();
        config.server.dns_port = 0;
        assert!(config.validate().is_err());
    }
}
