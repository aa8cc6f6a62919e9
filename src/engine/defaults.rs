use super::matcher::Rules;
use crate::error::PatternError;
use crate::{Attributes, RuleRef};

/// Wraps another matcher and answers with default rules when it finds
/// nothing.
///
/// Default rules have no pattern; they are listed by [`Rules::rules`] (and so
/// receive `finish`) alongside the wrapped matcher's rules, in the order the
/// two kinds were added.
pub struct WithDefaultsRulesWrapper {
    inner: Box<dyn Rules>,
    defaults: Vec<RuleRef>,
    all: Vec<RuleRef>,
}

impl WithDefaultsRulesWrapper {
    pub fn new(inner: impl Rules + 'static) -> Self {
        WithDefaultsRulesWrapper::wrap(Box::new(inner))
    }

    pub fn wrap(inner: Box<dyn Rules>) -> Self {
        let all = inner.rules();
        WithDefaultsRulesWrapper { inner, defaults: Vec::new(), all }
    }

    pub fn add_default(&mut self, rule: RuleRef) {
        self.defaults.push(rule.clone());
        self.all.push(rule);
    }

    pub fn defaults(&self) -> &[RuleRef] {
        &self.defaults
    }

    pub fn inner(&self) -> &dyn Rules {
        self.inner.as_ref()
    }
}

impl Rules for WithDefaultsRulesWrapper {
    fn add(&mut self, pattern: &str, rule: RuleRef) -> Result<(), PatternError> {
        self.inner.add(pattern, rule.clone())?;
        self.all.push(rule);
        Ok(())
    }

    fn clear(&mut self) {
        self.inner.clear();
        self.defaults.clear();
        self.all.clear();
    }

    fn match_rules(&self, namespace_uri: &str, path: &str, name: &str, attributes: &Attributes) -> Vec<RuleRef> {
        let matched = self.inner.match_rules(namespace_uri, path, name, attributes);
        if matched.is_empty() { self.defaults.clone() } else { matched }
    }

    fn rules(&self) -> Vec<RuleRef> {
        self.all.clone()
    }

    fn namespace_uri(&self) -> Option<&str> {
        self.inner.namespace_uri()
    }

    fn set_namespace_uri(&mut self, namespace_uri: Option<&str>) {
        self.inner.set_namespace_uri(namespace_uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RulesBase;
    use crate::test_support::{Recorder, names};
    use std::rc::Rc;

    #[test]
    fn defaults_fill_in_when_nothing_matches() {
        let mut rules = WithDefaultsRulesWrapper::new(RulesBase::new());
        rules.add("a", Rc::new(Recorder::new("a").0)).unwrap();
        rules.add_default(Rc::new(Recorder::new("d1").0));
        rules.add("*/b", Rc::new(Recorder::new("b").0)).unwrap();
        rules.add_default(Rc::new(Recorder::new("d2").0));

        let attrs = Attributes::new();
        assert_eq!(names(&rules.match_rules("", "a", "a", &attrs)), vec!["a"]);
        assert_eq!(names(&rules.match_rules("", "a/b", "b", &attrs)), vec!["b"]);
        assert_eq!(names(&rules.match_rules("", "a/c", "c", &attrs)), vec!["d1", "d2"]);
        assert_eq!(names(&rules.rules()), vec!["a", "d1", "b", "d2"]);
        assert_eq!(rules.defaults().len(), 2);
        assert_eq!(names(&rules.inner().rules()), vec!["a", "b"]);

        rules.clear();
        assert!(rules.match_rules("", "a/c", "c", &attrs).is_empty());
    }
}
