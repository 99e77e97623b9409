//! Policy caches and the snapshot refresher.
//!
//! `snapshot()` is a lock-free pointer load; the refresher rebuilds a new
//! `PolicySnapshot` from the store and publishes it atomically. The rules
//! index is the expensive part, so its rebuild is cost-managed: a cheap
//! `MAX(id)` probe at most every 30 s, and a selection-key comparison at
//! most every 2 s.

use super::builder;
use super::warmup::WarmupTracker;
use arc_swap::ArcSwap;
use sentinel_dns_application::ports::{
    setting_keys, BlocklistRefresher, PolicyStore, RuleQueryScope,
};
use sentinel_dns_application::snapshot::{PolicySnapshot, RulesIndex};
use sentinel_dns_domain::{DomainError, UpstreamConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const MAX_ID_PROBE_COOLDOWN: Duration = Duration::from_secs(30);
const SELECTION_KEY_COOLDOWN: Duration = Duration::from_secs(2);

struct RulesState {
    index: Arc<RulesIndex>,
    built: bool,
    selection_key: String,
    last_max_id: Option<i64>,
    last_probe: Option<Instant>,
    last_rebuild: Option<Instant>,
}

pub struct PolicyCache {
    store: Arc<dyn PolicyStore>,
    refresher: Option<Arc<dyn BlocklistRefresher>>,
    snapshot: ArcSwap<PolicySnapshot>,
    default_upstream: UpstreamConfig,
    rules_state: Mutex<RulesState>,
    warmup: WarmupTracker,
}

impl PolicyCache {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        default_upstream: UpstreamConfig,
        refresher: Option<Arc<dyn BlocklistRefresher>>,
    ) -> Self {
        Self {
            store,
            refresher,
            snapshot: ArcSwap::from_pointee(PolicySnapshot::empty(default_upstream.clone())),
            default_upstream,
            rules_state: Mutex::new(RulesState {
                index: Arc::new(RulesIndex::default()),
                built: false,
                selection_key: String::new(),
                last_max_id: None,
                last_probe: None,
                last_rebuild: None,
            }),
            warmup: WarmupTracker::new(),
        }
    }

    /// O(1) load of the current snapshot handle.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.snapshot.load_full()
    }

    /// Full rebuild from the store. On error the previous snapshot keeps
    /// serving; the caller decides how loudly to complain.
    pub async fn refresh_now(&self) -> Result<(), DomainError> {
        let blocklists = self.store.list_blocklists().await?;
        let clients: Vec<_> = self
            .store
            .list_clients()
            .await?
            .into_iter()
            .map(Arc::new)
            .collect();

        let upstream = builder::parse_upstream(
            self.store.get_setting(setting_keys::DNS_SETTINGS).await?,
            &self.default_upstream,
        );
        let rewrites =
            builder::parse_rewrites(self.store.get_setting(setting_keys::DNS_REWRITES).await?);
        let global_apps = builder::parse_global_apps(
            self.store.get_setting(setting_keys::GLOBAL_BLOCKED_APPS).await?,
        );
        let pause = builder::parse_pause(
            self.store.get_setting(setting_keys::PROTECTION_PAUSE).await?,
        );

        let tables = builder::classify_lists(&blocklists);
        let needed = builder::compute_needed_lists(&tables, &clients, &global_apps);
        let key = builder::selection_key(&needed);

        let rules = self.rules_index_for(&needed, key).await?;

        if let Some(refresher) = &self.refresher {
            for list in &blocklists {
                if needed.contains(&list.id) && tables.app_list_ids.contains(&list.id) {
                    self.warmup.maybe_refresh(refresher, list);
                }
            }
        }

        let previous = self.snapshot.load();
        let next = PolicySnapshot {
            generation: previous.generation + 1,
            clients,
            rules,
            blocklists: tables.blocklists,
            category_list_ids: tables.category_list_ids,
            app_list_ids: tables.app_list_ids,
            lists_by_category: tables.lists_by_category,
            lists_by_app: tables.lists_by_app,
            global_apps,
            rewrites,
            upstream,
            protection_pause: pause,
        };
        debug!(generation = next.generation, clients = next.clients.len(), "Policy snapshot published");
        self.snapshot.store(Arc::new(next));
        Ok(())
    }

    /// Fast path for the latency-sensitive pause subfield: re-read only the
    /// `protection_pause` setting and republish when it changed. A store
    /// hiccup keeps the last value.
    pub async fn refresh_pause(&self) -> Result<(), DomainError> {
        let value = self.store.get_setting(setting_keys::PROTECTION_PAUSE).await?;
        let pause = builder::parse_pause(value);

        let current = self.snapshot.load();
        if current.protection_pause != pause {
            info!(?pause, "Protection pause changed");
            let next = current.with_pause(pause, current.generation + 1);
            self.snapshot.store(Arc::new(next));
        }
        Ok(())
    }

    async fn rules_index_for(
        &self,
        needed: &rustc_hash::FxHashSet<i64>,
        key: String,
    ) -> Result<Arc<RulesIndex>, DomainError> {
        let mut state = self.rules_state.lock().await;

        let mut rebuild = !state.built;

        if !rebuild && key != state.selection_key {
            let cooled =
                state.last_rebuild.map_or(true, |at| at.elapsed() >= SELECTION_KEY_COOLDOWN);
            if cooled {
                rebuild = true;
            }
        }

        if !rebuild {
            let probe_due =
                state.last_probe.map_or(true, |at| at.elapsed() >= MAX_ID_PROBE_COOLDOWN);
            if probe_due {
                let max_id = self.store.max_rule_id().await?;
                state.last_probe = Some(Instant::now());
                if max_id != state.last_max_id {
                    state.last_max_id = max_id;
                    rebuild = true;
                }
            }
        }

        if rebuild {
            let manual = self.store.list_rules(RuleQueryScope::Manual).await?;
            let by_list = self
                .store
                .list_rules(RuleQueryScope::ByBlocklistIds(
                    needed.iter().copied().collect::<HashSet<i64>>(),
                ))
                .await?;

            let mut all = manual;
            all.extend(by_list);
            let index = Arc::new(RulesIndex::build(&all));

            info!(
                rules = all.len(),
                needed_lists = needed.len(),
                "Rules index rebuilt"
            );

            state.index = Arc::clone(&index);
            state.built = true;
            state.selection_key = key;
            state.last_rebuild = Some(Instant::now());
            state.last_max_id = self.store.max_rule_id().await?;
            state.last_probe = Some(Instant::now());
        }

        Ok(Arc::clone(&state.index))
    }
}
