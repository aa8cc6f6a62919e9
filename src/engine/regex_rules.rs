//! Matcher delegating to a pluggable string-matching strategy.
//!
//! Every registered pattern accepted by the strategy contributes its rules,
//! in registration order. There is no best-match exclusivity and no
//! namespace filtering.

use super::matcher::{RuleEntry, Rules, collect_rules};
use crate::error::PatternError;
use crate::{Attributes, RuleRef};
use std::fmt;

/// Predicate compiled from one pattern.
pub type CompiledMatcher = Box<dyn Fn(&str) -> bool>;

/// Turns a pattern into a path predicate, once, at registration time.
pub trait StringMatcher {
    fn compile(&self, pattern: &str) -> Result<CompiledMatcher, PatternError>;
}

/// Shell-style globbing: `*` any run of characters (including `/`), `?` one
/// character, `[...]` a character class.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobMatcher;

impl StringMatcher for GlobMatcher {
    fn compile(&self, pattern: &str) -> Result<CompiledMatcher, PatternError> {
        let glob = glob::Pattern::new(pattern)
            .map_err(|e| PatternError::InvalidRegex { pattern: pattern.to_string(), message: e.to_string() })?;
        Ok(Box::new(move |path| glob.matches(path)))
    }
}

/// Regular expressions, anchored at both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexMatcher;

impl StringMatcher for RegexMatcher {
    fn compile(&self, pattern: &str) -> Result<CompiledMatcher, PatternError> {
        let re = regex::Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| PatternError::InvalidRegex { pattern: pattern.to_string(), message: e.to_string() })?;
        Ok(Box::new(move |path| re.is_match(path)))
    }
}

pub struct RegexRules {
    matcher: Box<dyn StringMatcher>,
    registered: Vec<(RuleEntry, CompiledMatcher)>,
    namespace_uri: Option<String>,
}

impl RegexRules {
    pub fn new(matcher: impl StringMatcher + 'static) -> Self {
        RegexRules { matcher: Box::new(matcher), registered: Vec::new(), namespace_uri: None }
    }

    /// Swap the strategy. Existing registrations keep their compiled form.
    pub fn set_matcher(&mut self, matcher: impl StringMatcher + 'static) {
        self.matcher = Box::new(matcher);
    }
}

impl fmt::Debug for RegexRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<&str> = self.registered.iter().map(|(e, _)| e.pattern.as_str()).collect();
        f.debug_struct("RegexRules").field("patterns", &patterns).finish()
    }
}

impl Rules for RegexRules {
    fn add(&mut self, pattern: &str, rule: RuleRef) -> Result<(), PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        let compiled = self.matcher.compile(pattern)?;
        let entry = RuleEntry {
            pattern: pattern.to_string(),
            namespace_uri: self.namespace_uri.clone(),
            rule,
            order: self.registered.len(),
        };
        self.registered.push((entry, compiled));
        Ok(())
    }

    fn clear(&mut self) {
        self.registered.clear();
    }

    fn match_rules(&self, _namespace_uri: &str, path: &str, _name: &str, _attributes: &Attributes) -> Vec<RuleRef> {
        collect_rules(self.registered.iter().filter(|(_, matches)| matches(path)).map(|(entry, _)| entry))
    }

    fn rules(&self) -> Vec<RuleRef> {
        collect_rules(self.registered.iter().map(|(entry, _)| entry))
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

    fn add(rules: &mut RegexRules, pattern: &str, name: &str) {
        rules.add(pattern, Rc::new(Recorder::new(name).0)).unwrap();
    }

    fn matched(rules: &RegexRules, path: &str) -> Vec<String> {
        names(&rules.match_rules("", path, "", &Attributes::new()))
    }

    #[test]
    fn glob_returns_every_match_in_registration_order() {
        let mut rules = RegexRules::new(GlobMatcher);
        add(&mut rules, "*/item", "any-item");
        add(&mut rules, "order/*", "under-order");
        add(&mut rules, "order/item", "exact");
        add(&mut rules, "order/ite?", "one-char");

        assert_eq!(matched(&rules, "order/item"), vec!["any-item", "under-order", "exact", "one-char"]);
        assert_eq!(matched(&rules, "x/y/item"), vec!["any-item"]);
        assert!(matched(&rules, "order").is_empty());
    }

    #[test]
    fn regex_is_anchored() {
        let mut rules = RegexRules::new(RegexMatcher);
        add(&mut rules, r"a/(b|c)", "bc");
        add(&mut rules, r".*/d", "d");

        assert_eq!(matched(&rules, "a/c"), vec!["bc"]);
        assert!(matched(&rules, "a/c/x").is_empty());
        assert!(matched(&rules, "xa/b").is_empty());
        assert_eq!(matched(&rules, "q/r/d"), vec!["d"]);
    }

    #[test]
    fn invalid_patterns_fail_at_registration() {
        let mut rules = RegexRules::new(RegexMatcher);
        let err = rules.add("a/(b", Rc::new(Recorder::new("r").0)).unwrap_err();
        assert!(matches!(err, PatternError::InvalidRegex { .. }));

        let mut globs = RegexRules::new(GlobMatcher);
        assert!(globs.add("a/[b", Rc::new(Recorder::new("r").0)).is_err());
        assert!(rules.rules().is_empty());
    }

    #[test]
    fn namespace_is_not_a_filter() {
        let mut rules = RegexRules::new(GlobMatcher);
        rules.set_namespace_uri(Some("urn:x"));
        add(&mut rules, "a", "r");
        assert_eq!(names(&rules.match_rules("urn:other", "a", "a", &Attributes::new())), vec!["r"]);
    }
}
