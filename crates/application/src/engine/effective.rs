//! Effective-policy composition: schedules, apps, blocklist selection.
//!
//! Per-dimension precedence: the effective client's `use_global_*` flag
//! decides whether the base selection is the global one or the client's
//! own; active schedules of both the exact and the subnet client union
//! their contributions on top. Active always overrides shadow after union.

use crate::catalog::AppCatalog;
use crate::engine::ResolvedClient;
use crate::snapshot::PolicySnapshot;
use chrono::NaiveDateTime;
use rustc_hash::FxHashSet;
use sentinel_dns_domain::{ClientProfile, Scope, ScheduleEffect};
use std::sync::Arc;

/// The composed per-query policy for the schedule, app, and blocklist
/// checks.
#[derive(Debug, Default)]
pub struct EffectivePolicy {
    /// Set when any active schedule demands a full block, with the scope to
    /// blame (client schedules win over subnet schedules).
    pub block_all: Option<Scope>,
    /// Active apps in precedence order: client schedule, client base,
    /// subnet schedule, subnet base, global base.
    pub active_apps: Vec<(Scope, Arc<str>)>,
    /// Selected "normal" blocklists (non-catalog), plus category lists.
    pub normal_list_ids: FxHashSet<i64>,
    pub active_app_list_ids: FxHashSet<i64>,
    pub shadow_app_list_ids: FxHashSet<i64>,
}

pub fn compose(
    snapshot: &PolicySnapshot,
    resolved: &ResolvedClient<'_>,
    now: NaiveDateTime,
) -> EffectivePolicy {
    let catalog = AppCatalog::shared();
    let mut policy = EffectivePolicy::default();

    let exact = resolved.exact;
    let subnet = resolved.subnet;
    let effective = resolved.effective();

    let exact_effects = active_effects(exact, now);
    let subnet_effects = active_effects(subnet, now);

    if let (Some(client), true) = (exact, exact_effects.iter().any(|e| e.block_all)) {
        policy.block_all = Some(Scope::Client(client.id));
    } else if let (Some(client), true) = (subnet, subnet_effects.iter().any(|e| e.block_all)) {
        policy.block_all = Some(Scope::Subnet(client.id));
    }

    // Apps, in scope precedence order.
    let push_apps = |apps: &[String], scope: Scope, out: &mut Vec<(Scope, Arc<str>)>| {
        for app in apps {
            if out.iter().all(|(_, existing)| existing.as_ref() != app.as_str()) {
                out.push((scope, Arc::from(app.as_str())));
            }
        }
    };

    let mut active_apps = Vec::new();
    if let Some(client) = exact {
        for effect in &exact_effects {
            push_apps(&effect.apps, Scope::Client(client.id), &mut active_apps);
        }
        if !client.policy.use_global_apps {
            push_apps(&client.policy.blocked_apps, Scope::Client(client.id), &mut active_apps);
        }
    }
    if let Some(client) = subnet {
        for effect in &subnet_effects {
            push_apps(&effect.apps, Scope::Subnet(client.id), &mut active_apps);
        }
        if exact.is_none() && !client.policy.use_global_apps {
            push_apps(&client.policy.blocked_apps, Scope::Subnet(client.id), &mut active_apps);
        }
    }
    let global_apps_in_play = effective.map_or(true, |c| c.policy.use_global_apps);
    if global_apps_in_play {
        push_apps(&snapshot.global_apps.blocked_apps, Scope::Global, &mut active_apps);
    }
    policy.active_apps = active_apps;

    // Categories fold their list ids into the normal selection.
    let mut selected_categories: Vec<&str> = Vec::new();
    for effect in exact_effects.iter().chain(subnet_effects.iter()) {
        for category in &effect.categories {
            if !selected_categories.contains(&category.as_str()) {
                selected_categories.push(category);
            }
        }
    }
    let use_global_categories = effective.map_or(true, |c| c.policy.use_global_categories);
    if use_global_categories {
        // A globally selected category is one whose lists carry enabled
        // rows; only those enabled ids contribute.
        for ids in snapshot.lists_by_category.values() {
            for &id in ids {
                if snapshot.list_info(id).is_some_and(|info| info.enabled) {
                    policy.normal_list_ids.insert(id);
                }
            }
        }
    } else if let Some(client) = effective {
        for category in &client.policy.blocked_categories {
            if !selected_categories.contains(&category.as_str()) {
                selected_categories.push(category);
            }
        }
    }
    for category in selected_categories {
        if let Some(ids) = snapshot.lists_by_category.get(category) {
            policy.normal_list_ids.extend(ids.iter().copied());
        } else if catalog.category(category).is_none() {
            tracing::debug!(category, "Unknown category in policy selection");
        }
    }

    // Normal blocklists.
    let use_global_blocklists = effective.map_or(true, |c| c.policy.use_global_blocklists);
    if use_global_blocklists {
        policy.normal_list_ids.extend(snapshot.enabled_normal_list_ids());
    } else if let Some(client) = effective {
        // Custom assignments apply even when the list is globally disabled.
        policy.normal_list_ids.extend(client.policy.assigned_blocklists.iter().copied());
    }

    // App blocklists: active from the composed app set, shadow from the
    // global shadow apps; active wins on overlap.
    for (_, app) in &policy.active_apps {
        if let Some(ids) = snapshot.lists_by_app.get(app.as_ref()) {
            policy.active_app_list_ids.extend(ids.iter().copied());
        }
    }
    if global_apps_in_play {
        for app in &snapshot.global_apps.shadow_apps {
            if let Some(ids) = snapshot.lists_by_app.get(app.as_str()) {
                let active = &policy.active_app_list_ids;
                policy
                    .shadow_app_list_ids
                    .extend(ids.iter().copied().filter(|id| !active.contains(id)));
            }
        }
    }

    policy
}

fn active_effects(client: Option<&Arc<ClientProfile>>, now: NaiveDateTime) -> Vec<ScheduleEffect> {
    client
        .map(|c| {
            c.policy
                .schedules
                .iter()
                .filter(|s| s.window_contains(now))
                .map(|s| s.effect())
                .collect()
        })
        .unwrap_or_default()
}
