use std::sync::Arc;

/// Which policy layer a decision was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Client(i64),
    Subnet(i64),
    Global,
}

impl Scope {
    fn policy_prefix(&self) -> &'static str {
        match self {
            Scope::Client(_) => "ClientPolicy",
            Scope::Subnet(_) => "SubnetPolicy",
            Scope::Global => "GlobalPolicy",
        }
    }
}

/// Why a query was let through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowReason {
    ManualRule(Scope),
    ProtectionPaused,
}

/// Result of evaluating one query against a policy snapshot.
///
/// The engine does no I/O; the pipeline turns this into a synthesized
/// response, an upstream forward, or both (shadow paths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Rewrite { target: Arc<str> },
    BlockedByInternetPause { scope: Scope },
    BlockedByBlockAll { scope: Scope },
    BlockedByApp { scope: Scope, app: Arc<str> },
    BlockedByRule { scope: Scope },
    BlockedByList { list_id: i64, name: Arc<str> },
    ShadowBlocked { marker: String },
    Allowed { reason: AllowReason },
    PassThrough,
}

impl Decision {
    /// The response to the client is a synthesized NXDOMAIN.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Decision::BlockedByInternetPause { .. }
                | Decision::BlockedByBlockAll { .. }
                | Decision::BlockedByApp { .. }
                | Decision::BlockedByRule { .. }
                | Decision::BlockedByList { .. }
        )
    }

    /// Human-readable marker recorded in the query log's `blocklist_id`
    /// column. `None` for decisions with nothing to attribute.
    pub fn marker(&self) -> Option<String> {
        match self {
            Decision::BlockedByInternetPause { scope } => {
                Some(format!("{}:InternetPaused", scope.policy_prefix()))
            }
            Decision::BlockedByBlockAll { scope } => {
                Some(format!("{}:BlockAll", scope.policy_prefix()))
            }
            Decision::BlockedByApp { scope, app } => {
                Some(format!("{}:App:{}", scope.policy_prefix(), app))
            }
            Decision::BlockedByRule { scope } | Decision::Allowed { reason: AllowReason::ManualRule(scope) } => {
                Some(match scope {
                    Scope::Client(id) => format!("ClientRule:{}", id),
                    Scope::Subnet(id) => format!("SubnetRule:{}", id),
                    Scope::Global => "Manual".to_string(),
                })
            }
            Decision::BlockedByList { list_id, name } => {
                Some(format!("Blocklist:{}:{}", list_id, name))
            }
            Decision::ShadowBlocked { marker } => Some(marker.clone()),
            Decision::Allowed { reason: AllowReason::ProtectionPaused } | Decision::Rewrite { .. } | Decision::PassThrough => None,
        }
    }
}

/// Marker for a blocklist hit, shared by the blocked and shadow paths.
pub fn blocklist_marker(list_id: i64, name: &str) -> String {
    format!("Blocklist:{}:{}", list_id, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_internet_pause() {
        let d = Decision::BlockedByInternetPause { scope: Scope::Client(7) };
        assert_eq!(d.marker().unwrap(), "ClientPolicy:InternetPaused");
    }

    #[test]
    fn test_marker_block_all_subnet() {
        let d = Decision::BlockedByBlockAll { scope: Scope::Subnet(2) };
        assert_eq!(d.marker().unwrap(), "SubnetPolicy:BlockAll");
    }

    #[test]
    fn test_marker_app_global() {
        let d = Decision::BlockedByApp { scope: Scope::Global, app: Arc::from("tiktok") };
        assert_eq!(d.marker().unwrap(), "GlobalPolicy:App:tiktok");
    }

    #[test]
    fn test_marker_manual_rules() {
        assert_eq!(
            Decision::BlockedByRule { scope: Scope::Global }.marker().unwrap(),
            "Manual"
        );
        assert_eq!(
            Decision::BlockedByRule { scope: Scope::Client(3) }.marker().unwrap(),
            "ClientRule:3"
        );
        assert_eq!(
            Decision::Allowed { reason: AllowReason::ManualRule(Scope::Subnet(9)) }
                .marker()
                .unwrap(),
            "SubnetRule:9"
        );
    }

    #[test]
    fn test_marker_list() {
        let d = Decision::BlockedByList { list_id: 4, name: Arc::from("Ads") };
        assert_eq!(d.marker().unwrap(), "Blocklist:4:Ads");
    }

    #[test]
    fn test_pass_through_has_no_marker() {
        assert!(Decision::PassThrough.marker().is_none());
    }
}
