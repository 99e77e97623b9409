//! Domain-name canonicalization and parent-label expansion.
//!
//! Every policy lookup operates on canonical names: lowercase, no trailing
//! dot. Candidate expansion yields the name and each parent suffix at a
//! label boundary, most specific first, which is the order manual rules and
//! blocklist hits are probed in.

/// Canonicalize a query name: lowercase, trailing dot stripped.
///
/// Idempotent: `canonicalize(canonicalize(x)) == canonicalize(x)`.
pub fn canonicalize(name: &str) -> String {
    let trimmed = name.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

/// Iterator over a canonical name and its parent suffixes.
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com`,
/// `example.com`, `com`.
pub fn candidates(name: &str) -> Candidates<'_> {
    Candidates {
        rest: if name.is_empty() { None } else { Some(name) },
    }
}

pub struct Candidates<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for Candidates<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let current = self.rest?;
        self.rest = current.find('.').map(|dot| &current[dot + 1..]);
        Some(current)
    }
}

/// True when `name` equals `suffix` or ends with `.suffix`.
///
/// Equivalent to candidate membership when `suffix` is itself stored, but
/// usable directly against app suffix tables.
pub fn matches_suffix(name: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    if name == suffix {
        return true;
    }
    name.len() > suffix.len()
        && name.ends_with(suffix)
        && name.as_bytes()[name.len() - suffix.len() - 1] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_lowercases_and_strips_dot() {
        assert_eq!(canonicalize("WWW.Example.COM."), "www.example.com");
        assert_eq!(canonicalize("example.com"), "example.com");
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let once = canonicalize("Foo.Bar.");
        assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn test_candidates_suffix_list() {
        let all: Vec<&str> = candidates("a.b.example.com").collect();
        assert_eq!(all, vec!["a.b.example.com", "b.example.com", "example.com", "com"]);
    }

    #[test]
    fn test_candidates_single_label() {
        let all: Vec<&str> = candidates("localhost").collect();
        assert_eq!(all, vec!["localhost"]);
    }

    #[test]
    fn test_candidates_empty() {
        assert_eq!(candidates("").count(), 0);
    }

    #[test]
    fn test_candidates_end_at_label_boundaries() {
        let original = "mail.google.com";
        for c in candidates(original) {
            assert!(original == c || original.ends_with(&format!(".{}", c)));
        }
    }

    #[test]
    fn test_matches_suffix() {
        assert!(matches_suffix("foo.tiktokcdn.com", "tiktokcdn.com"));
        assert!(matches_suffix("tiktokcdn.com", "tiktokcdn.com"));
        assert!(!matches_suffix("nottiktokcdn.com", "tiktokcdn.com"));
        assert!(!matches_suffix("tiktokcdn.com", "foo.tiktokcdn.com"));
        assert!(!matches_suffix("anything", ""));
    }
}
