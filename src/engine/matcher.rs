use crate::error::PatternError;
use crate::{Attributes, RuleRef};

/// Pattern-matching strategy consulted once per start tag.
///
/// Implementations return rules in registration order. An empty vector means
/// "nothing matched" and is never an error.
pub trait Rules {
    /// Register `rule` under `pattern`, tagged with the current
    /// [`namespace_uri`](Rules::namespace_uri).
    fn add(&mut self, pattern: &str, rule: RuleRef) -> Result<(), PatternError>;

    /// Forget every registration.
    fn clear(&mut self);

    /// Rules applying to the element at `path` (`"a/b/c"`).
    fn match_rules(&self, namespace_uri: &str, path: &str, name: &str, attributes: &Attributes) -> Vec<RuleRef>;

    /// Every registered rule, in registration order.
    fn rules(&self) -> Vec<RuleRef>;

    fn namespace_uri(&self) -> Option<&str>;

    /// Namespace applied to rules registered from now on (`None` = any).
    fn set_namespace_uri(&mut self, namespace_uri: Option<&str>);

    /// For a temporary decorator: give back the wrapped matcher.
    ///
    /// Plain matchers and permanent wrappers return `None`.
    fn take_decorated(&mut self) -> Option<Box<dyn Rules>> {
        None
    }
}

/// One registration: pattern, namespace filter and a global sequence number.
#[derive(Clone)]
pub struct RuleEntry {
    pub pattern: String,
    pub namespace_uri: Option<String>,
    pub rule: RuleRef,
    pub order: usize,
}

impl RuleEntry {
    /// A rule without a namespace applies everywhere; a scoped rule only to
    /// elements in exactly its namespace.
    pub fn accepts(&self, namespace_uri: &str) -> bool {
        self.namespace_uri.as_deref().is_none_or(|ns| ns == namespace_uri)
    }
}

impl std::fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEntry")
            .field("pattern", &self.pattern)
            .field("namespace_uri", &self.namespace_uri)
            .field("rule", &self.rule.name())
            .field("order", &self.order)
            .finish()
    }
}

/// Drop a trailing `/` (but keep a lone `/` as-is).
pub(crate) fn normalize_pattern(pattern: &str) -> &str {
    if pattern.len() > 1 { pattern.strip_suffix('/').unwrap_or(pattern) } else { pattern }
}

/// Structural check shared by the path-based matchers.
pub(crate) fn validate_pattern(pattern: &str) -> Result<(), PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    if pattern.split('/').any(str::is_empty) {
        return Err(PatternError::EmptySegment(pattern.to_string()));
    }
    Ok(())
}

pub(crate) fn collect_rules<'a>(entries: impl IntoIterator<Item = &'a RuleEntry>) -> Vec<RuleRef> {
    entries.into_iter().map(|e| e.rule.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Recorder;
    use std::rc::Rc;

    #[test]
    fn normalizes_trailing_slash() {
        assert_eq!(normalize_pattern("a/b/"), "a/b");
        assert_eq!(normalize_pattern("a"), "a");
        assert_eq!(normalize_pattern("/"), "/");
    }

    #[test]
    fn rejects_empty_patterns_and_segments() {
        assert_eq!(validate_pattern(""), Err(PatternError::Empty));
        assert!(matches!(validate_pattern("a//b"), Err(PatternError::EmptySegment(_))));
        assert!(matches!(validate_pattern("/a"), Err(PatternError::EmptySegment(_))));
        assert!(validate_pattern("*/a/b").is_ok());
    }

    #[test]
    fn namespace_compatibility() {
        let (rule, _log) = Recorder::new("r");
        let any = RuleEntry { pattern: "a".into(), namespace_uri: None, rule: Rc::new(rule), order: 0 };
        let scoped = RuleEntry { namespace_uri: Some("urn:x".into()), ..any.clone() };

        assert!(any.accepts("urn:y"));
        assert!(scoped.accepts("urn:x"));
        assert!(!scoped.accepts("urn:y"));
        assert!(!scoped.accepts(""), "unqualified elements only take unscoped rules");
        assert!(any.accepts(""));
    }
}
