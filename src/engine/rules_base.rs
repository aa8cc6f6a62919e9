//! Default matcher: exact paths and `*/suffix` wildcards.
//!
//! Lookup order for an element at `path`:
//!
//! 1. the exact pattern `path`, filtered by namespace;
//! 2. otherwise the longest `*/suffix` pattern whose suffix is `path` itself
//!    or a whole-segment suffix of it. Among equally long keys the one
//!    registered first wins.
//!
//! `*/x/a` therefore beats `*/a` for `.../x/a`, and `a/b/c` beats both.

use super::matcher::{RuleEntry, Rules, collect_rules, normalize_pattern, validate_pattern};
use crate::error::PatternError;
use crate::{Attributes, RuleRef};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RulesBase {
    /// Pattern -> entries, in registration order.
    pub(super) cache: HashMap<String, Vec<RuleEntry>>,
    /// Distinct patterns in first-registration order.
    pub(super) keys: Vec<String>,
    /// Every entry in registration order.
    pub(super) entries: Vec<RuleEntry>,
    namespace_uri: Option<String>,
}

impl RulesBase {
    pub fn new() -> Self {
        RulesBase::default()
    }

    /// Registered entries, in registration order.
    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Store an already validated registration and return its entry.
    pub(super) fn register(&mut self, pattern: &str, rule: RuleRef) -> RuleEntry {
        let entry = RuleEntry {
            pattern: pattern.to_string(),
            namespace_uri: self.namespace_uri.clone(),
            rule,
            order: self.entries.len(),
        };
        let slot = self.cache.entry(pattern.to_string()).or_default();
        if slot.is_empty() {
            self.keys.push(pattern.to_string());
        }
        slot.push(entry.clone());
        self.entries.push(entry.clone());
        entry
    }

    fn lookup(&self, namespace_uri: &str, pattern: &str) -> Vec<RuleRef> {
        match self.cache.get(pattern) {
            Some(list) => collect_rules(list.iter().filter(|e| e.accepts(namespace_uri))),
            None => Vec::new(),
        }
    }
}

/// Whether `*/suffix` (given as `suffix`) covers `path`.
pub(super) fn suffix_matches(suffix: &str, path: &str) -> bool {
    path == suffix
        || (path.len() > suffix.len()
            && path.ends_with(suffix)
            && path[..path.len() - suffix.len()].ends_with('/'))
}

impl Rules for RulesBase {
    fn add(&mut self, pattern: &str, rule: RuleRef) -> Result<(), PatternError> {
        let pattern = normalize_pattern(pattern);
        validate_pattern(pattern)?;
        let rest = pattern.strip_prefix("*/").unwrap_or(pattern);
        if rest.split('/').any(|seg| seg == "*") {
            return Err(PatternError::Misplaced {
                pattern: pattern.to_string(),
                reason: "'*' is only allowed as a leading '*/'",
            });
        }
        self.register(pattern, rule);
        Ok(())
    }

    fn clear(&mut self) {
        self.cache.clear();
        self.keys.clear();
        self.entries.clear();
    }

    fn match_rules(&self, namespace_uri: &str, path: &str, _name: &str, _attributes: &Attributes) -> Vec<RuleRef> {
        let exact = self.lookup(namespace_uri, path);
        if !exact.is_empty() {
            return exact;
        }

        let mut best: Option<&str> = None;
        for key in &self.keys {
            let Some(suffix) = key.strip_prefix("*/") else { continue };
            if suffix_matches(suffix, path) && best.is_none_or(|b| key.len() > b.len()) {
                best = Some(key);
            }
        }
        match best {
            Some(key) => self.lookup(namespace_uri, key),
            None => Vec::new(),
        }
    }

    fn rules(&self) -> Vec<RuleRef> {
        collect_rules(&self.entries)
    }

    fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    fn set_namespace_uri(&mut self, namespace_uri: Option<&str>) {
        self.namespace_uri = namespace_uri.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Recorder, names};
    use std::rc::Rc;

    fn rule(name: &str) -> RuleRef {
        Rc::new(Recorder::new(name).0)
    }

    fn matched(rules: &dyn Rules, path: &str) -> Vec<String> {
        names(&rules.match_rules("", path, "", &Attributes::new()))
    }

    #[test]
    fn exact_match_in_registration_order() {
        let mut rules = RulesBase::new();
        rules.add("a/b", rule("r1")).unwrap();
        rules.add("a/b", rule("r2")).unwrap();
        rules.add("a", rule("r3")).unwrap();

        assert_eq!(matched(&rules, "a/b"), vec!["r1", "r2"]);
        assert_eq!(matched(&rules, "a"), vec!["r3"]);
        assert!(matched(&rules, "a/b/c").is_empty());
    }

    #[test]
    fn exact_beats_wildcard() {
        let mut rules = RulesBase::new();
        rules.add("*/c", rule("r1")).unwrap();
        rules.add("a/b/c", rule("r2")).unwrap();

        assert_eq!(matched(&rules, "a/b/c"), vec!["r2"]);
        assert_eq!(matched(&rules, "x/c"), vec!["r1"]);
        assert_eq!(matched(&rules, "c"), vec!["r1"]);
    }

    #[test]
    fn longest_wildcard_wins() {
        let mut rules = RulesBase::new();
        rules.add("*/a", rule("short")).unwrap();
        rules.add("*/x/a", rule("long")).unwrap();

        assert_eq!(matched(&rules, "r/x/a"), vec!["long"]);
        assert_eq!(matched(&rules, "x/a"), vec!["long"]);
        assert_eq!(matched(&rules, "r/y/a"), vec!["short"]);
    }

    #[test]
    fn wildcard_suffix_respects_segment_boundaries() {
        let mut rules = RulesBase::new();
        rules.add("*/a", rule("r")).unwrap();
        assert!(matched(&rules, "x/ba").is_empty());
        assert!(suffix_matches("a", "x/a"));
        assert!(!suffix_matches("a", "xa"));
    }

    #[test]
    fn namespace_filter_applies_to_exact_lookups() {
        let mut rules = RulesBase::new();
        rules.set_namespace_uri(Some("urn:x"));
        rules.add("a", rule("x")).unwrap();
        rules.set_namespace_uri(None);
        rules.add("a", rule("any")).unwrap();

        let attrs = Attributes::new();
        assert_eq!(names(&rules.match_rules("urn:x", "a", "a", &attrs)), vec!["x", "any"]);
        assert_eq!(names(&rules.match_rules("urn:y", "a", "a", &attrs)), vec!["any"]);
        assert_eq!(names(&rules.match_rules("", "a", "a", &attrs)), vec!["any"]);
    }

    #[test]
    fn trailing_slash_is_normalized_and_bad_patterns_rejected() {
        let mut rules = RulesBase::new();
        rules.add("a/b/", rule("r")).unwrap();
        assert_eq!(matched(&rules, "a/b"), vec!["r"]);

        assert_eq!(rules.add("", rule("r")), Err(PatternError::Empty));
        for pattern in ["*/a/*/b", "a/*", "a/*/b", "*", "*/*"] {
            assert!(matches!(rules.add(pattern, rule("r")), Err(PatternError::Misplaced { .. })), "{pattern}");
        }
        assert!(rules.add("*/a/b", rule("r")).is_ok());
    }

    #[test]
    fn rules_lists_every_registration_and_clear_forgets() {
        let mut rules = RulesBase::new();
        let shared = rule("shared");
        rules.add("a", shared.clone()).unwrap();
        rules.add("*/b", shared).unwrap();
        rules.add("c", rule("c")).unwrap();
        assert_eq!(names(&rules.rules()), vec!["shared", "shared", "c"]);
        assert_eq!(rules.entries()[1].pattern, "*/b");

        rules.clear();
        assert!(rules.rules().is_empty());
        assert!(matched(&rules, "a").is_empty());
    }
}
