//! Snapshot assembly helpers: list classification, needed-list selection,
//! and strict decoding of the JSON setting rows.

use rustc_hash::{FxHashMap, FxHashSet};
use sentinel_dns_application::snapshot::BlocklistInfo;
use sentinel_dns_application::AppCatalog;
use sentinel_dns_domain::{
    Blocklist, ClientProfile, GlobalAppsSetting, ProtectionPause, Rewrite, RewriteTable,
    UpstreamConfig,
};
use std::sync::Arc;
use tracing::warn;

/// Classified view of the store's blocklist rows.
#[derive(Default)]
pub struct ListTables {
    pub blocklists: FxHashMap<i64, BlocklistInfo>,
    pub category_list_ids: FxHashSet<i64>,
    pub app_list_ids: FxHashSet<i64>,
    pub lists_by_category: FxHashMap<Arc<str>, Vec<i64>>,
    pub lists_by_app: FxHashMap<Arc<str>, Vec<i64>>,
}

/// Match blocklist rows against the catalog URLs to decide which rows
/// implement categories and apps.
pub fn classify_lists(blocklists: &[Blocklist]) -> ListTables {
    let catalog = AppCatalog::shared();
    let mut tables = ListTables::default();

    for list in blocklists {
        tables.blocklists.insert(
            list.id,
            BlocklistInfo { name: Arc::clone(&list.name), enabled: list.enabled, mode: list.mode },
        );
    }

    for category in catalog.categories() {
        let ids: Vec<i64> = blocklists
            .iter()
            .filter(|l| category.list_urls.iter().any(|u| u.as_ref() == l.url.as_ref()))
            .map(|l| l.id)
            .collect();
        if !ids.is_empty() {
            tables.category_list_ids.extend(ids.iter().copied());
            tables.lists_by_category.insert(Arc::clone(&category.id), ids);
        }
    }

    for app in catalog.apps() {
        let ids: Vec<i64> = blocklists
            .iter()
            .filter(|l| app.list_urls.iter().any(|u| u.as_ref() == l.url.as_ref()))
            .map(|l| l.id)
            .collect();
        if !ids.is_empty() {
            tables.app_list_ids.extend(ids.iter().copied());
            tables.lists_by_app.insert(Arc::clone(&app.id), ids);
        }
    }

    tables
}

/// Every blocklist whose rules some policy path could select: globally
/// enabled normal lists, per-client assignments (even when globally
/// disabled), and catalog lists referenced by any client, schedule, or the
/// global app selection.
pub fn compute_needed_lists(
    tables: &ListTables,
    clients: &[Arc<ClientProfile>],
    global_apps: &GlobalAppsSetting,
) -> FxHashSet<i64> {
    let mut needed = FxHashSet::default();

    for (&id, info) in &tables.blocklists {
        let is_catalog = tables.category_list_ids.contains(&id) || tables.app_list_ids.contains(&id);
        if info.enabled && !is_catalog {
            needed.insert(id);
        }
    }

    // Enabled category lists form the global category selection.
    for &id in &tables.category_list_ids {
        if tables.blocklists.get(&id).is_some_and(|info| info.enabled) {
            needed.insert(id);
        }
    }

    let mut add_app = |app: &str| {
        if let Some(ids) = tables.lists_by_app.get(app) {
            needed.extend(ids.iter().copied());
        }
    };
    for app in global_apps.blocked_apps.iter().chain(global_apps.shadow_apps.iter()) {
        add_app(app);
    }

    for client in clients {
        needed.extend(client.policy.assigned_blocklists.iter().copied());
        for app in &client.policy.blocked_apps {
            if let Some(ids) = tables.lists_by_app.get(app.as_str()) {
                needed.extend(ids.iter().copied());
            }
        }
        for category in &client.policy.blocked_categories {
            if let Some(ids) = tables.lists_by_category.get(category.as_str()) {
                needed.extend(ids.iter().copied());
            }
        }
        for schedule in &client.policy.schedules {
            let effect = schedule.effect();
            for app in &effect.apps {
                if let Some(ids) = tables.lists_by_app.get(app.as_str()) {
                    needed.extend(ids.iter().copied());
                }
            }
            for category in &effect.categories {
                if let Some(ids) = tables.lists_by_category.get(category.as_str()) {
                    needed.extend(ids.iter().copied());
                }
            }
        }
    }

    needed
}

/// Canonical string over the sorted needed ids; a changed key forces a
/// rules-index rebuild.
pub fn selection_key(needed: &FxHashSet<i64>) -> String {
    let mut ids: Vec<i64> = needed.iter().copied().collect();
    ids.sort_unstable();
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join("-")
}

pub fn parse_upstream(value: Option<serde_json::Value>, fallback: &UpstreamConfig) -> UpstreamConfig {
    match value {
        Some(value) => match serde_json::from_value::<UpstreamConfig>(value) {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(error = %e, "Malformed dns_settings, using default upstream");
                fallback.clone()
            }
        },
        None => fallback.clone(),
    }
}

pub fn parse_rewrites(value: Option<serde_json::Value>) -> RewriteTable {
    match value {
        Some(value) => match serde_json::from_value::<Vec<Rewrite>>(value) {
            Ok(entries) => RewriteTable::build(&entries),
            Err(e) => {
                warn!(error = %e, "Malformed dns_rewrites, ignoring");
                RewriteTable::default()
            }
        },
        None => RewriteTable::default(),
    }
}

pub fn parse_global_apps(value: Option<serde_json::Value>) -> GlobalAppsSetting {
    match value {
        Some(value) => match serde_json::from_value::<GlobalAppsSetting>(value) {
            Ok(setting) => setting.normalized(),
            Err(e) => {
                warn!(error = %e, "Malformed global_blocked_apps, ignoring");
                GlobalAppsSetting::default()
            }
        },
        None => GlobalAppsSetting::default(),
    }
}

pub fn parse_pause(value: Option<serde_json::Value>) -> ProtectionPause {
    match value {
        Some(value) => match serde_json::from_value::<ProtectionPause>(value) {
            Ok(pause) => pause,
            Err(e) => {
                warn!(error = %e, "Malformed protection_pause, treating as off");
                ProtectionPause::Off
            }
        },
        None => ProtectionPause::Off,
    }
}
