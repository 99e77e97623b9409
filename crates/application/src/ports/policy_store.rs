use async_trait::async_trait;
use sentinel_dns_domain::{Blocklist, ClientProfile, DomainError, Rule};
use std::collections::HashSet;

/// Setting keys the engine reads from the store.
pub mod setting_keys {
    pub const DNS_SETTINGS: &str = "dns_settings";
    pub const DNS_REWRITES: &str = "dns_rewrites";
    pub const GLOBAL_BLOCKED_APPS: &str = "global_blocked_apps";
    pub const PROTECTION_PAUSE: &str = "protection_pause";
}

/// Which rule rows a refresh needs.
#[derive(Debug, Clone)]
pub enum RuleQueryScope {
    /// Manual rules of any scope (global, per-client, per-subnet).
    Manual,
    /// Rules contributed by the given blocklist ids.
    ByBlocklistIds(HashSet<i64>),
}

/// Read-only view of the mutable policy configuration. The schema is owned
/// by an external collaborator; the engine only consumes these operations
/// at refresh time.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn list_blocklists(&self) -> Result<Vec<Blocklist>, DomainError>;

    /// Clients in deterministic store order (`updated_at DESC, id ASC`);
    /// the order doubles as the CIDR tiebreak.
    async fn list_clients(&self) -> Result<Vec<ClientProfile>, DomainError>;

    async fn list_rules(&self, scope: RuleQueryScope) -> Result<Vec<Rule>, DomainError>;

    /// Raw JSON value of a setting row, `None` when absent.
    async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, DomainError>;

    /// Cheap `MAX(id)` probe over the rules table.
    async fn max_rule_id(&self) -> Result<Option<i64>, DomainError>;
}
