/// Manual or list-sourced rule row. The `category` column encodes scope.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i64,
    pub domain: String,
    pub kind: RuleKind,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Allowed,
    Blocked,
}

impl RuleKind {
    pub fn parse(s: &str) -> RuleKind {
        if s.eq_ignore_ascii_case("allowed") {
            RuleKind::Allowed
        } else {
            RuleKind::Blocked
        }
    }
}

/// Parsed form of the `category` column:
/// `Blocklist:<id>[:<name>]`, `Client:<id>[:...]`, `Subnet:<id>[:...]`,
/// anything else (including empty) is a global manual rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Blocklist(i64),
    Client(i64),
    Subnet(i64),
    Global,
}

impl RuleScope {
    pub fn parse(category: &str) -> RuleScope {
        let mut parts = category.splitn(3, ':');
        let prefix = parts.next().unwrap_or("");
        let id = parts.next().and_then(|s| s.parse::<i64>().ok());

        match (prefix, id) {
            ("Blocklist", Some(id)) => RuleScope::Blocklist(id),
            ("Client", Some(id)) => RuleScope::Client(id),
            ("Subnet", Some(id)) => RuleScope::Subnet(id),
            _ => RuleScope::Global,
        }
    }
}
