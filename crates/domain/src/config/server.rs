use serde::{Deserialize, Serialize};

/// How the DNS port is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Ipv4,
    Ipv6,
    Dual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_dns_host")]
    pub dns_host: String,

    #[serde(default = "default_dns_port")]
    pub dns_port: u16,

    #[serde(default)]
    pub bind_mode: BindMode,

    #[serde(default = "default_true")]
    pub enable_dns: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dns_host: default_dns_host(),
            dns_port: default_dns_port(),
            bind_mode: BindMode::default(),
            enable_dns: true,
        }
    }
}

fn default_dns_host() -> String {
    "0.0.0.0".to_string()
}

fn default_dns_port() -> u16 {
    53
}

fn default_true() -> bool {
    true
}
