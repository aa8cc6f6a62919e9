//! Extended matcher with universal, direct-child, ancestor and catch-all
//! patterns.
//!
//! Pattern forms, on top of what [`RulesBase`] accepts:
//!
//! | Pattern     | Matches                                             |
//! |-------------|-----------------------------------------------------|
//! | `a/b/?`     | direct children of `a/b`                            |
//! | `a/b/*`     | every descendant of `a/b`                           |
//! | `*/b/?`     | direct children of any `.../b`                      |
//! | `*/b/*`     | `b` itself and everything under any `.../b`         |
//! | `!a/b/*`    | `a/b` itself and every descendant                   |
//! | `*`         | anything, when no other basic pattern matched       |
//! | `!pattern`  | `pattern`, collected regardless of the best match   |
//!
//! Non-universal ("basic") patterns compete: exact beats `parent/?`, which
//! beats the nearest `ancestor/*`. Failing those, the longest matching
//! wildcard key wins, where length excludes the `*` and `?` markers.
//! Universal matches are always added. The final list is ordered by
//! registration.

use super::matcher::{RuleEntry, Rules, collect_rules, normalize_pattern, validate_pattern};
use super::rules_base::{RulesBase, suffix_matches};
use crate::error::PatternError;
use crate::{Attributes, RuleRef};

bitflags::bitflags! {
    /// Shape of a registered key, computed once at registration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct PatternFlags: u8 {
        /// Leading `!`.
        const UNIVERSAL = 1 << 0;
        /// Starts with `*/` (after any `!`).
        const LEADING_WILDCARD = 1 << 1;
        /// Ends with `/*`.
        const TRAILING_WILDCARD = 1 << 2;
        /// Ends with `/?`.
        const PARENT_MATCH = 1 << 3;
    }
}

impl PatternFlags {
    fn of(key: &str) -> PatternFlags {
        let mut flags = PatternFlags::empty();
        let body = match key.strip_prefix('!') {
            Some(rest) => {
                flags |= PatternFlags::UNIVERSAL;
                rest
            }
            None => key,
        };
        flags.set(PatternFlags::LEADING_WILDCARD, body.starts_with("*/"));
        flags.set(PatternFlags::TRAILING_WILDCARD, body.len() > 1 && body.ends_with("/*"));
        flags.set(PatternFlags::PARENT_MATCH, body.ends_with("/?"));
        flags
    }
}

#[derive(Debug)]
struct CompiledKey {
    key: String,
    flags: PatternFlags,
}

#[derive(Debug, Default)]
pub struct ExtendedBaseRules {
    base: RulesBase,
    compiled: Vec<CompiledKey>,
}

impl ExtendedBaseRules {
    pub fn new() -> Self {
        ExtendedBaseRules::default()
    }

    fn list(&self, key: &str) -> Option<&Vec<RuleEntry>> {
        self.base.cache.get(key)
    }

    /// Nearest proper ancestor of `path` registered as `ancestor/*`.
    fn exact_ancestor_match(&self, path: &str) -> Option<&Vec<RuleEntry>> {
        let mut end = path.len();
        while let Some(idx) = path[..end].rfind('/') {
            if idx == 0 {
                break;
            }
            if let Some(list) = self.list(&format!("{}/*", &path[..idx])) {
                return Some(list);
            }
            end = idx;
        }
        None
    }
}

fn validate_extended(pattern: &str) -> Result<(), PatternError> {
    let body = pattern.strip_prefix('!').unwrap_or(pattern);
    let misplaced = |reason| Err(PatternError::Misplaced { pattern: pattern.to_string(), reason });
    if body.contains('!') {
        return misplaced("'!' is only allowed as the first character");
    }
    if body == "*" {
        return Ok(());
    }
    validate_pattern(body)?;
    let segments: Vec<&str> = body.split('/').collect();
    let last = segments.len() - 1;
    for (idx, seg) in segments.iter().enumerate() {
        match *seg {
            "?" if idx != last || idx == 0 => return misplaced("'?' must be the last segment below a parent"),
            "*" if idx != 0 && idx != last => return misplaced("'*' is only allowed as the first or last segment"),
            _ => {}
        }
    }
    Ok(())
}

/// `key` is the pattern without `!`, e.g. `*/b/?`.
fn parent_matches(key: &str, parent: &str) -> bool {
    let inner = &key[..key.len() - 2];
    match inner.strip_prefix("*/") {
        Some(suffix) => suffix_matches(suffix, parent),
        None => inner == parent,
    }
}

/// `*/b/*`: `b` occurs as a whole segment run anywhere in `path`.
fn ancestor_matches(key: &str, path: &str) -> bool {
    let inner = &key[2..key.len() - 2];
    path == inner
        || suffix_matches(inner, path)
        || path.starts_with(&format!("{inner}/"))
        || path.contains(&format!("/{inner}/"))
}

impl Rules for ExtendedBaseRules {
    fn add(&mut self, pattern: &str, rule: RuleRef) -> Result<(), PatternError> {
        let pattern = normalize_pattern(pattern);
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        validate_extended(pattern)?;
        let is_new = !self.base.cache.contains_key(pattern);
        self.base.register(pattern, rule);
        if is_new {
            self.compiled.push(CompiledKey { key: pattern.to_string(), flags: PatternFlags::of(pattern) });
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.base.clear();
        self.compiled.clear();
    }

    fn match_rules(&self, namespace_uri: &str, path: &str, _name: &str, _attributes: &Attributes) -> Vec<RuleRef> {
        let parent = path.rfind('/').map(|idx| &path[..idx]);

        let mut universal: Vec<&RuleEntry> = Vec::new();
        if let Some(list) = self.list("!*") {
            universal.extend(list);
        }
        if let Some(list) = self.list(&format!("!{}/?", parent.unwrap_or(""))) {
            universal.extend(list);
        }

        let mut basic = self.list(path);
        if basic.is_none() {
            if let Some(parent) = parent {
                basic = self.list(&format!("{parent}/?")).or_else(|| self.exact_ancestor_match(path));
            }
        }
        let settled = basic.is_some();

        let mut longest = 0;
        for compiled in &self.compiled {
            let flags = compiled.flags;
            let leading = flags.contains(PatternFlags::LEADING_WILDCARD);
            let trailing = flags.contains(PatternFlags::TRAILING_WILDCARD);
            let is_universal = flags.contains(PatternFlags::UNIVERSAL);
            if !(leading || (is_universal && trailing)) {
                continue;
            }
            let key = compiled.key.strip_prefix('!').unwrap_or(&compiled.key);

            let matched = if flags.contains(PatternFlags::PARENT_MATCH) {
                parent.is_some_and(|p| parent_matches(key, p))
            } else if leading && trailing {
                ancestor_matches(key, path)
            } else if leading {
                suffix_matches(&key[2..], path)
            } else {
                // `!a/b/*`: `a/b` and its descendants.
                path == &key[..key.len() - 2] || path.starts_with(&key[..key.len() - 1])
            };
            if !matched {
                continue;
            }

            if is_universal {
                if let Some(list) = self.list(&compiled.key) {
                    universal.extend(list);
                }
            } else if !settled {
                let mut len = key.len();
                if leading {
                    len -= 1;
                }
                if trailing || flags.contains(PatternFlags::PARENT_MATCH) {
                    len -= 1;
                }
                if len > longest {
                    basic = self.list(key);
                    longest = len;
                }
            }
        }

        if basic.is_none() {
            basic = self.list("*");
        }

        let mut found: Vec<&RuleEntry> = basic.into_iter().flatten().chain(universal).collect();
        found.retain(|e| e.accepts(namespace_uri));
        found.sort_by_key(|e| e.order);
        found.dedup_by_key(|e| e.order);
        collect_rules(found)
    }

    fn rules(&self) -> Vec<RuleRef> {
        self.base.rules()
    }

    fn namespace_uri(&self) -> Option<&str> {
        self.base.namespace_uri()
    }

    fn set_namespace_uri(&mut self, namespace_uri: Option<&str>) {
        self.base.set_namespace_uri(namespace_uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Recorder, names};
    use std::rc::Rc;

    fn rules_with(patterns: &[(&str, &str)]) -> ExtendedBaseRules {
        let mut rules = ExtendedBaseRules::new();
        for (pattern, name) in patterns {
            rules.add(pattern, Rc::new(Recorder::new(name).0)).unwrap();
        }
        rules
    }

    fn matched(rules: &ExtendedBaseRules, path: &str) -> Vec<String> {
        names(&rules.match_rules("", path, "", &Attributes::new()))
    }

    #[test]
    fn flags_describe_key_shape() {
        assert_eq!(PatternFlags::of("!*/a/*"), PatternFlags::all() - PatternFlags::PARENT_MATCH);
        assert_eq!(PatternFlags::of("a/?"), PatternFlags::PARENT_MATCH);
        assert_eq!(PatternFlags::of("*"), PatternFlags::empty());
    }

    #[test]
    fn base_semantics_still_hold() {
        let rules = rules_with(&[("*/c", "r1"), ("a/b/c", "r2"), ("*/b/c", "r3")]);
        assert_eq!(matched(&rules, "a/b/c"), vec!["r2"]);
        assert_eq!(matched(&rules, "x/b/c"), vec!["r3"]);
        assert_eq!(matched(&rules, "x/y/c"), vec!["r1"]);
    }

    #[test]
    fn exact_beats_parent_match_which_beats_ancestor() {
        let rules = rules_with(&[("a/*", "anc"), ("a/b/?", "child"), ("a/b/c", "exact")]);
        assert_eq!(matched(&rules, "a/b/c"), vec!["exact"]);
        assert_eq!(matched(&rules, "a/b/d"), vec!["child"]);
        assert_eq!(matched(&rules, "a/b/d/e"), vec!["anc"]);
        assert_eq!(matched(&rules, "a/x"), vec!["anc"]);
        assert!(matched(&rules, "a").is_empty());
    }

    #[test]
    fn nearest_ancestor_wins() {
        let rules = rules_with(&[("a/*", "outer"), ("a/b/*", "inner")]);
        assert_eq!(matched(&rules, "a/b/c/d"), vec!["inner"]);
        assert_eq!(matched(&rules, "a/c/d"), vec!["outer"]);
    }

    #[test]
    fn wildcard_forms_compete_by_length() {
        let rules = rules_with(&[("*/b/?", "child-of-b"), ("*/c", "c"), ("*/x/b/*", "under-x-b")]);
        assert_eq!(matched(&rules, "r/b/c"), vec!["child-of-b"]);
        assert_eq!(matched(&rules, "r/x/b/c"), vec!["under-x-b"]);
        assert_eq!(matched(&rules, "c"), vec!["c"]);
        assert_eq!(matched(&rules, "b/c"), vec!["child-of-b"]);
    }

    #[test]
    fn catch_all_only_when_nothing_else_matched() {
        let rules = rules_with(&[("*", "any"), ("a/b", "ab")]);
        assert_eq!(matched(&rules, "a/b"), vec!["ab"]);
        assert_eq!(matched(&rules, "a"), vec!["any"]);
        assert_eq!(matched(&rules, "z/y/x"), vec!["any"]);
    }

    #[test]
    fn universal_patterns_join_the_best_match_in_registration_order() {
        let rules = rules_with(&[
            ("!*/c", "u-suffix"),
            ("a/b/c", "exact"),
            ("!a/b/?", "u-child"),
            ("!*", "u-all"),
            ("*/c", "wild"),
        ]);
        assert_eq!(matched(&rules, "a/b/c"), vec!["u-suffix", "exact", "u-child", "u-all"]);
        assert_eq!(matched(&rules, "q/c"), vec!["u-suffix", "u-all", "wild"]);
        assert_eq!(matched(&rules, "q"), vec!["u-all"]);
    }

    #[test]
    fn universal_ancestor_patterns() {
        let rules = rules_with(&[("!a/*", "u-prefix"), ("!*/b/*", "u-any-b"), ("a/b/c", "exact")]);
        assert_eq!(matched(&rules, "a/b/c"), vec!["u-prefix", "u-any-b", "exact"]);
        assert_eq!(matched(&rules, "x/b"), vec!["u-any-b"]);
        assert_eq!(matched(&rules, "a"), vec!["u-prefix"]);
        assert_eq!(matched(&rules, "ab/c"), Vec::<String>::new());
    }

    #[test]
    fn namespace_filter_applies_after_collection() {
        let mut rules = ExtendedBaseRules::new();
        rules.set_namespace_uri(Some("urn:x"));
        rules.add("!*", Rc::new(Recorder::new("x-all").0)).unwrap();
        rules.set_namespace_uri(None);
        rules.add("a", Rc::new(Recorder::new("a").0)).unwrap();

        let attrs = Attributes::new();
        assert_eq!(names(&rules.match_rules("urn:y", "a", "a", &attrs)), vec!["a"]);
        assert_eq!(names(&rules.match_rules("urn:x", "a", "a", &attrs)), vec!["x-all", "a"]);
    }

    #[test]
    fn rejects_misplaced_markers() {
        let mut rules = ExtendedBaseRules::new();
        let rule: RuleRef = Rc::new(Recorder::new("r").0);
        assert!(matches!(rules.add("a/!b", rule.clone()), Err(PatternError::Misplaced { .. })));
        assert!(matches!(rules.add("a/?/b", rule.clone()), Err(PatternError::Misplaced { .. })));
        assert!(matches!(rules.add("?", rule.clone()), Err(PatternError::Misplaced { .. })));
        assert!(matches!(rules.add("a/*/b", rule.clone()), Err(PatternError::Misplaced { .. })));
        assert!(matches!(rules.add("a//b", rule.clone()), Err(PatternError::EmptySegment(_))));
        assert!(rules.add("!*/a/?", rule).is_ok());
    }
}
