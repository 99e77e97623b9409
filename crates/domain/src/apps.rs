use serde::{Deserialize, Serialize};

/// The `global_blocked_apps` setting row.
///
/// Shadow entries report hits in telemetry without blocking; an app present
/// in both sets is treated as active.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalAppsSetting {
    #[serde(default)]
    pub blocked_apps: Vec<String>,
    #[serde(default)]
    pub shadow_apps: Vec<String>,
}

impl GlobalAppsSetting {
    /// Remove active apps from the shadow set and drop duplicates, keeping
    /// first-seen order.
    pub fn normalized(mut self) -> Self {
        self.blocked_apps.dedup_preserving_order();
        self.shadow_apps
            .retain(|app| !self.blocked_apps.iter().any(|active| active == app));
        self.shadow_apps.dedup_preserving_order();
        self
    }
}

trait DedupPreservingOrder {
    fn dedup_preserving_order(&mut self);
}

impl DedupPreservingOrder for Vec<String> {
    fn dedup_preserving_order(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.retain(|item| seen.insert(item.clone()));
    }
}
