//! SQLite adapter for the policy store port.
//!
//! Read-only from the engine's point of view: refreshes query these tables
//! but never write them. The profile column is strict-decoded here so the
//! engine only ever sees typed structures.

use async_trait::async_trait;
use sentinel_dns_application::ports::{PolicyStore, RuleQueryScope};
use sentinel_dns_domain::{
    Blocklist, ClientPolicy, ClientProfile, DomainError, ListMode, Rule, RuleKind, RuleScope,
};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::warn;

pub struct SqlitePolicyStore {
    pool: SqlitePool,
}

impl SqlitePolicyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    async fn list_blocklists(&self) -> Result<Vec<Blocklist>, DomainError> {
        let rows = sqlx::query(
            "SELECT id, name, url, enabled, mode, last_updated_at, last_rule_count \
             FROM blocklists ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| Blocklist {
                id: row.get("id"),
                name: Arc::from(row.get::<String, _>("name").as_str()),
                url: Arc::from(row.get::<String, _>("url").as_str()),
                enabled: row.get::<i64, _>("enabled") != 0,
                mode: ListMode::parse(&row.get::<String, _>("mode")),
                last_updated_at: row.get("last_updated_at"),
                last_rule_count: row.get("last_rule_count"),
            })
            .collect())
    }

    async fn list_clients(&self) -> Result<Vec<ClientProfile>, DomainError> {
        let rows = sqlx::query(
            "SELECT id, name, ip_address, subnet_cidr, profile \
             FROM clients ORDER BY updated_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;

        let mut clients = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let name: String = row.get("name");

            let address = match row.get::<Option<String>, _>("ip_address") {
                Some(raw) => match raw.parse() {
                    Ok(ip) => Some(ip),
                    Err(_) => {
                        warn!(client_id = id, ip = %raw, "Skipping client with unparseable IP");
                        continue;
                    }
                },
                None => None,
            };

            let subnet = match row.get::<Option<String>, _>("subnet_cidr") {
                Some(raw) => match raw.parse() {
                    Ok(net) => Some(net),
                    Err(_) => {
                        warn!(client_id = id, cidr = %raw, "Skipping client with unparseable CIDR");
                        continue;
                    }
                },
                None => None,
            };

            let profile_json: String = row.get("profile");
            let policy: ClientPolicy = match serde_json::from_str(&profile_json) {
                Ok(policy) => policy,
                Err(e) => {
                    warn!(client_id = id, error = %e, "Malformed client profile, using defaults");
                    ClientPolicy::default()
                }
            };

            clients.push(ClientProfile {
                id,
                name: Arc::from(name.as_str()),
                address,
                subnet,
                policy,
            });
        }

        Ok(clients)
    }

    async fn list_rules(&self, scope: RuleQueryScope) -> Result<Vec<Rule>, DomainError> {
        let (query, filter_ids) = match &scope {
            RuleQueryScope::Manual => (
                "SELECT id, domain, type, category FROM rules \
                 WHERE category NOT LIKE 'Blocklist:%'",
                None,
            ),
            RuleQueryScope::ByBlocklistIds(ids) => (
                "SELECT id, domain, type, category FROM rules \
                 WHERE category LIKE 'Blocklist:%'",
                Some(ids),
            ),
        };

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let rule = Rule {
                id: row.get("id"),
                domain: row.get("domain"),
                kind: RuleKind::parse(&row.get::<String, _>("type")),
                category: row.get("category"),
            };
            if let Some(ids) = filter_ids {
                match RuleScope::parse(&rule.category) {
                    RuleScope::Blocklist(list_id) if ids.contains(&list_id) => {}
                    _ => continue,
                }
            }
            rules.push(rule);
        }

        Ok(rules)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, DomainError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|e| DomainError::Database(format!("setting '{}': {}", key, e)))
            }
            None => Ok(None),
        }
    }

    async fn max_rule_id(&self) -> Result<Option<i64>, DomainError> {
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(id) FROM rules")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}
