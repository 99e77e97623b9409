//! Immutable policy snapshot consumed on the hot path.
//!
//! A refresh builds a whole new `PolicySnapshot` and publishes it behind an
//! atomic pointer swap; an in-flight query keeps the `Arc` it loaded, so
//! every field it reads comes from the same generation.

use rustc_hash::{FxHashMap, FxHashSet};
use sentinel_dns_domain::{
    ClientProfile, GlobalAppsSetting, ListMode, ProtectionPause, RewriteTable, Rule, RuleKind,
    RuleScope, UpstreamConfig,
};
use smallvec::SmallVec;
use std::sync::Arc;

/// Hot-path view of one blocklist row.
#[derive(Debug, Clone)]
pub struct BlocklistInfo {
    pub name: Arc<str>,
    pub enabled: bool,
    pub mode: ListMode,
}

/// Denormalized reverse index over the rules table, partitioned by scope at
/// build time so the engine never parses `category` strings per query.
#[derive(Debug, Default)]
pub struct RulesIndex {
    pub global_allow: FxHashSet<String>,
    pub global_block: FxHashSet<String>,
    pub client_allow: FxHashMap<i64, FxHashSet<String>>,
    pub client_block: FxHashMap<i64, FxHashSet<String>>,
    pub subnet_allow: FxHashMap<i64, FxHashSet<String>>,
    pub subnet_block: FxHashMap<i64, FxHashSet<String>>,
    /// domain → ids of blocklists carrying it.
    pub list_hits: FxHashMap<String, SmallVec<[i64; 2]>>,
}

impl RulesIndex {
    pub fn build(rules: &[Rule]) -> Self {
        let mut index = RulesIndex::default();

        for rule in rules {
            let domain = sentinel_dns_domain::name::canonicalize(&rule.domain);
            if domain.is_empty() {
                continue;
            }

            match RuleScope::parse(&rule.category) {
                RuleScope::Blocklist(list_id) => {
                    if rule.kind == RuleKind::Blocked {
                        let hits = index.list_hits.entry(domain).or_default();
                        if !hits.contains(&list_id) {
                            hits.push(list_id);
                        }
                    }
                }
                RuleScope::Client(client_id) => match rule.kind {
                    RuleKind::Allowed => {
                        index.client_allow.entry(client_id).or_default().insert(domain);
                    }
                    RuleKind::Blocked => {
                        index.client_block.entry(client_id).or_default().insert(domain);
                    }
                },
                RuleScope::Subnet(subnet_id) => match rule.kind {
                    RuleKind::Allowed => {
                        index.subnet_allow.entry(subnet_id).or_default().insert(domain);
                    }
                    RuleKind::Blocked => {
                        index.subnet_block.entry(subnet_id).or_default().insert(domain);
                    }
                },
                RuleScope::Global => match rule.kind {
                    RuleKind::Allowed => {
                        index.global_allow.insert(domain);
                    }
                    RuleKind::Blocked => {
                        index.global_block.insert(domain);
                    }
                },
            }
        }

        index
    }

    pub fn is_empty(&self) -> bool {
        self.global_allow.is_empty()
            && self.global_block.is_empty()
            && self.client_allow.is_empty()
            && self.client_block.is_empty()
            && self.subnet_allow.is_empty()
            && self.subnet_block.is_empty()
            && self.list_hits.is_empty()
    }
}

/// Everything the decision engine reads for one query, from one refresh
/// generation.
pub struct PolicySnapshot {
    pub generation: u64,
    /// Store order (`updated_at DESC, id ASC`); doubles as the CIDR
    /// equal-prefix tiebreak.
    pub clients: Vec<Arc<ClientProfile>>,
    pub rules: Arc<RulesIndex>,
    pub blocklists: FxHashMap<i64, BlocklistInfo>,
    /// Ids of blocklists implementing catalog categories / apps; excluded
    /// from "normal" blocklist selection.
    pub category_list_ids: FxHashSet<i64>,
    pub app_list_ids: FxHashSet<i64>,
    pub lists_by_category: FxHashMap<Arc<str>, Vec<i64>>,
    pub lists_by_app: FxHashMap<Arc<str>, Vec<i64>>,
    pub global_apps: GlobalAppsSetting,
    pub rewrites: RewriteTable,
    pub upstream: UpstreamConfig,
    pub protection_pause: ProtectionPause,
}

impl PolicySnapshot {
    /// Minimal snapshot used before the first refresh and in tests.
    pub fn empty(upstream: UpstreamConfig) -> Self {
        Self {
            generation: 0,
            clients: Vec::new(),
            rules: Arc::new(RulesIndex::default()),
            blocklists: FxHashMap::default(),
            category_list_ids: FxHashSet::default(),
            app_list_ids: FxHashSet::default(),
            lists_by_category: FxHashMap::default(),
            lists_by_app: FxHashMap::default(),
            global_apps: GlobalAppsSetting::default(),
            rewrites: RewriteTable::default(),
            upstream,
            protection_pause: ProtectionPause::Off,
        }
    }

    pub fn list_info(&self, id: i64) -> Option<&BlocklistInfo> {
        self.blocklists.get(&id)
    }

    /// Clone of this snapshot with only the protection pause replaced, for
    /// the fast 1 s pause refresh; everything else stays consistent.
    pub fn with_pause(&self, pause: ProtectionPause, generation: u64) -> PolicySnapshot {
        PolicySnapshot {
            generation,
            clients: self.clients.clone(),
            rules: Arc::clone(&self.rules),
            blocklists: self.blocklists.clone(),
            category_list_ids: self.category_list_ids.clone(),
            app_list_ids: self.app_list_ids.clone(),
            lists_by_category: self.lists_by_category.clone(),
            lists_by_app: self.lists_by_app.clone(),
            global_apps: self.global_apps.clone(),
            rewrites: self.rewrites.clone(),
            upstream: self.upstream.clone(),
            protection_pause: pause,
        }
    }

    /// Enabled lists that belong to neither the category nor the app
    /// catalog: the global "normal" selection.
    pub fn enabled_normal_list_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.blocklists.iter().filter_map(|(&id, info)| {
            let is_catalog = self.category_list_ids.contains(&id) || self.app_list_ids.contains(&id);
            (info.enabled && !is_catalog).then_some(id)
        })
    }
}
