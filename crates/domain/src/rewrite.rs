use crate::name::matches_suffix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A local DNS override. `wildcard` extends the match to `*.domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rewrite {
    pub id: i64,
    pub domain: String,
    pub target: String,
    #[serde(default)]
    pub wildcard: bool,
}

/// Lookup structure for rewrites: exact map plus a wildcard list sorted
/// longest-domain-first so the most specific wildcard wins.
#[derive(Debug, Clone, Default)]
pub struct RewriteTable {
    exact: HashMap<String, Arc<str>>,
    wildcards: Vec<(String, Arc<str>)>,
}

impl RewriteTable {
    pub fn build(entries: &[Rewrite]) -> Self {
        let mut exact = HashMap::new();
        let mut wildcards: Vec<(String, Arc<str>)> = Vec::new();

        for entry in entries {
            let domain = entry.domain.trim_end_matches('.').to_ascii_lowercase();
            if domain.is_empty() {
                continue;
            }
            let target: Arc<str> = Arc::from(entry.target.as_str());
            if entry.wildcard {
                wildcards.push((domain.clone(), Arc::clone(&target)));
            }
            // A wildcard also matches its own apex.
            exact.entry(domain).or_insert(target);
        }

        wildcards.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self { exact, wildcards }
    }

    /// Resolve a canonical query name to a rewrite target.
    pub fn lookup(&self, canonical: &str) -> Option<&Arc<str>> {
        if let Some(target) = self.exact.get(canonical) {
            return Some(target);
        }
        self.wildcards
            .iter()
            .find(|(domain, _)| matches_suffix(canonical, domain))
            .map(|(_, target)| target)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, domain: &str, target: &str, wildcard: bool) -> Rewrite {
        Rewrite {
            id,
            domain: domain.into(),
            target: target.into(),
            wildcard,
        }
    }

    #[test]
    fn test_exact_lookup() {
        let table = RewriteTable::build(&[entry(1, "printer.lan", "192.168.1.10", false)]);
        assert_eq!(table.lookup("printer.lan").unwrap().as_ref(), "192.168.1.10");
        assert!(table.lookup("other.lan").is_none());
    }

    #[test]
    fn test_wildcard_matches_subdomains_and_apex() {
        let table = RewriteTable::build(&[entry(1, "lab.lan", "10.0.0.2", true)]);
        assert_eq!(table.lookup("lab.lan").unwrap().as_ref(), "10.0.0.2");
        assert_eq!(table.lookup("a.b.lab.lan").unwrap().as_ref(), "10.0.0.2");
        assert!(table.lookup("notlab.lan").is_none());
    }

    #[test]
    fn test_longest_wildcard_wins() {
        let table = RewriteTable::build(&[
            entry(1, "lan", "1.1.1.1", true),
            entry(2, "dev.lan", "2.2.2.2", true),
        ]);
        assert_eq!(table.lookup("x.dev.lan").unwrap().as_ref(), "2.2.2.2");
        assert_eq!(table.lookup("x.lan").unwrap().as_ref(), "1.1.1.1");
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let table = RewriteTable::build(&[
            entry(1, "lan", "1.1.1.1", true),
            entry(2, "nas.lan", "3.3.3.3", false),
        ]);
        assert_eq!(table.lookup("nas.lan").unwrap().as_ref(), "3.3.3.3");
    }

    #[test]
    fn test_domains_normalized_at_build() {
        let table = RewriteTable::build(&[entry(1, "Printer.LAN.", "192.168.1.10", false)]);
        assert!(table.lookup("printer.lan").is_some());
    }
}
