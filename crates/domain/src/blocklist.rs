use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Whether a list's hits really block or only mark telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListMode {
    Active,
    Shadow,
}

impl ListMode {
    pub fn parse(s: &str) -> ListMode {
        if s.eq_ignore_ascii_case("shadow") {
            ListMode::Shadow
        } else {
            ListMode::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListMode::Active => "ACTIVE",
            ListMode::Shadow => "SHADOW",
        }
    }
}

/// A curated blocklist row. Its rules appear in the rules index under the
/// `Blocklist:<id>` category scope.
#[derive(Debug, Clone)]
pub struct Blocklist {
    pub id: i64,
    pub name: Arc<str>,
    pub url: Arc<str>,
    pub enabled: bool,
    pub mode: ListMode,
    /// `None` until the external refresher has fetched the list once.
    pub last_updated_at: Option<String>,
    pub last_rule_count: i64,
}

impl Blocklist {
    /// The list's rows have never been fetched (or fetched empty), so an
    /// app or category depending on it needs a warmup refresh.
    pub fn needs_warmup(&self) -> bool {
        self.last_updated_at.is_none() || self.last_rule_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(ListMode::parse("SHADOW"), ListMode::Shadow);
        assert_eq!(ListMode::parse("shadow"), ListMode::Shadow);
        assert_eq!(ListMode::parse("ACTIVE"), ListMode::Active);
        assert_eq!(ListMode::parse("anything"), ListMode::Active);
    }

    #[test]
    fn test_needs_warmup() {
        let mut list = Blocklist {
            id: 1,
            name: Arc::from("Ads"),
            url: Arc::from("https://example.com/ads.txt"),
            enabled: true,
            mode: ListMode::Active,
            last_updated_at: None,
            last_rule_count: 0,
        };
        assert!(list.needs_warmup());

        list.last_updated_at = Some("2026-07-01 00:00:00".into());
        assert!(list.needs_warmup());

        list.last_rule_count = 1200;
        assert!(!list.needs_warmup());
    }
}
