//! The stateless decision engine.
//!
//! `evaluate` is a pure function over one policy snapshot: it does no I/O,
//! takes tens of microseconds, and cannot fail — indecisive or ill-formed
//! input yields `PassThrough` and the pipeline forwards upstream.

mod effective;

pub use effective::{compose, EffectivePolicy};

use crate::catalog::AppCatalog;
use crate::snapshot::PolicySnapshot;
use chrono::{DateTime, Local, Utc};
use rustc_hash::FxHashSet;
use sentinel_dns_domain::name::{candidates, canonicalize, matches_suffix};
use sentinel_dns_domain::{blocklist_marker, AllowReason, ClientProfile, Decision, ListMode, Scope};
use smallvec::SmallVec;
use std::net::IpAddr;
use std::sync::Arc;

/// Exact-IP and longest-prefix CIDR clients matched for a query address.
pub struct ResolvedClient<'a> {
    pub exact: Option<&'a Arc<ClientProfile>>,
    pub subnet: Option<&'a Arc<ClientProfile>>,
}

impl<'a> ResolvedClient<'a> {
    /// The client whose policy defaults apply.
    pub fn effective(&self) -> Option<&'a Arc<ClientProfile>> {
        self.exact.or(self.subnet)
    }
}

/// Match a client address against the snapshot's clients: exact IP first,
/// otherwise the same-family CIDR with the longest prefix. Equal prefixes
/// tie-break to the earliest client in store order, which is stable across
/// refreshes for unchanged inputs.
pub fn resolve_client(snapshot: &PolicySnapshot, ip: IpAddr) -> ResolvedClient<'_> {
    let exact = snapshot.clients.iter().find(|c| c.address == Some(ip));

    let mut subnet: Option<&Arc<ClientProfile>> = None;
    for client in &snapshot.clients {
        if !client.subnet_contains(ip) {
            continue;
        }
        let prefix = client.prefix_len().unwrap_or(0);
        let best = subnet.and_then(|c| c.prefix_len()).unwrap_or(0);
        if subnet.is_none() || prefix > best {
            subnet = Some(client);
        }
    }

    ResolvedClient { exact, subnet }
}

/// Evaluate one query against the snapshot. `now` drives schedule windows
/// (local minutes) and protection-pause expiry (UTC instant).
pub fn evaluate(
    snapshot: &PolicySnapshot,
    name: &str,
    client_ip: IpAddr,
    now: DateTime<Local>,
) -> Decision {
    let canonical = canonicalize(name);
    if canonical.is_empty() {
        return Decision::PassThrough;
    }

    // 1. Local rewrites win over everything, including the pauses.
    if let Some(target) = snapshot.rewrites.lookup(&canonical) {
        return Decision::Rewrite { target: Arc::clone(target) };
    }

    let resolved = resolve_client(snapshot, client_ip);

    // 2. Per-client kill-switch; the exact client takes the blame.
    if let Some(client) = resolved.exact {
        if client.policy.internet_paused {
            return Decision::BlockedByInternetPause { scope: Scope::Client(client.id) };
        }
    }
    if let Some(client) = resolved.subnet {
        if client.policy.internet_paused {
            return Decision::BlockedByInternetPause { scope: Scope::Subnet(client.id) };
        }
    }

    // 3. Protection pause bypasses all filtering below.
    if snapshot.protection_pause.is_active(now.with_timezone(&Utc)) {
        return Decision::Allowed { reason: AllowReason::ProtectionPaused };
    }

    let cands: SmallVec<[&str; 6]> = candidates(&canonical).collect();

    // 4. Manual rules: client → subnet → global; allow beats block within
    // a scope.
    if let Some(client) = resolved.exact {
        let allow = snapshot.rules.client_allow.get(&client.id);
        let block = snapshot.rules.client_block.get(&client.id);
        if let Some(decision) = manual_decision(allow, block, &cands, Scope::Client(client.id)) {
            return decision;
        }
    }
    if let Some(client) = resolved.subnet {
        let allow = snapshot.rules.subnet_allow.get(&client.id);
        let block = snapshot.rules.subnet_block.get(&client.id);
        if let Some(decision) = manual_decision(allow, block, &cands, Scope::Subnet(client.id)) {
            return decision;
        }
    }
    if let Some(decision) = manual_decision(
        Some(&snapshot.rules.global_allow),
        Some(&snapshot.rules.global_block),
        &cands,
        Scope::Global,
    ) {
        return decision;
    }

    // 5. Schedules and app/blocklist selections.
    let policy = compose(snapshot, &resolved, now.naive_local());
    if let Some(scope) = policy.block_all {
        return Decision::BlockedByBlockAll { scope };
    }

    // 6. App suffix fast path.
    let catalog = AppCatalog::shared();
    for (scope, app) in &policy.active_apps {
        if let Some(definition) = catalog.app(app.as_ref()) {
            if definition.suffixes.iter().any(|s| matches_suffix(&canonical, s)) {
                return Decision::BlockedByApp { scope: *scope, app: Arc::clone(&definition.id) };
            }
        }
    }

    // 7. Curated blocklists: normal selection first, then app lists.
    let mut shadow_marker: Option<String> = None;

    for cand in &cands {
        let Some(hits) = snapshot.rules.list_hits.get(*cand) else { continue };
        let selected: SmallVec<[i64; 4]> = hits
            .iter()
            .copied()
            .filter(|id| policy.normal_list_ids.contains(id))
            .collect();
        if selected.is_empty() {
            continue;
        }
        let active = selected
            .iter()
            .copied()
            .find(|id| snapshot.list_info(*id).is_some_and(|info| info.mode == ListMode::Active));
        match active {
            Some(list_id) => {
                return Decision::BlockedByList { list_id, name: list_name(snapshot, list_id) };
            }
            None => {
                let list_id = selected[0];
                shadow_marker =
                    Some(blocklist_marker(list_id, &list_name(snapshot, list_id)));
                // Only the most specific hit counts; the shadow marker
                // rides along while app lists get their turn.
                break;
            }
        }
    }

    for cand in &cands {
        let Some(hits) = snapshot.rules.list_hits.get(*cand) else { continue };
        if let Some(list_id) =
            hits.iter().copied().find(|id| policy.active_app_list_ids.contains(id))
        {
            return Decision::BlockedByList { list_id, name: list_name(snapshot, list_id) };
        }
    }
    if shadow_marker.is_none() {
        'shadow: for cand in &cands {
            let Some(hits) = snapshot.rules.list_hits.get(*cand) else { continue };
            if let Some(list_id) =
                hits.iter().copied().find(|id| policy.shadow_app_list_ids.contains(id))
            {
                shadow_marker = Some(blocklist_marker(list_id, &list_name(snapshot, list_id)));
                break 'shadow;
            }
        }
    }

    // 8–9. A recorded shadow hit outranks a clean pass.
    match shadow_marker {
        Some(marker) => Decision::ShadowBlocked { marker },
        None => Decision::PassThrough,
    }
}

fn manual_decision(
    allow: Option<&FxHashSet<String>>,
    block: Option<&FxHashSet<String>>,
    cands: &[&str],
    scope: Scope,
) -> Option<Decision> {
    if let Some(allow) = allow {
        if cands.iter().any(|c| allow.contains(*c)) {
            return Some(Decision::Allowed { reason: AllowReason::ManualRule(scope) });
        }
    }
    if let Some(block) = block {
        if cands.iter().any(|c| block.contains(*c)) {
            return Some(Decision::BlockedByRule { scope });
        }
    }
    None
}

fn list_name(snapshot: &PolicySnapshot, list_id: i64) -> Arc<str> {
    snapshot
        .list_info(list_id)
        .map(|info| Arc::clone(&info.name))
        .unwrap_or_else(|| Arc::from("unknown"))
}
