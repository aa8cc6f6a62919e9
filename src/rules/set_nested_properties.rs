//! Child-element text to properties.
//!
//! `begin` wraps the digester's matcher in [`AnyChildRules`], which adds an
//! [`AnyChildRule`] to the matches of every direct child of the current
//! element. `body` of the parent (which fires after all children have ended)
//! removes the wrapper again. Nested uses stack up and unwind in LIFO order.
//!
//! ```text
//! <person>                    begin: rules = AnyChildRules(prefix "person/", rules)
//!   <name>Ada</name>          AnyChildRule.body: top.name = "Ada"
//!   <age>36</age>             AnyChildRule.body: top.age = "36" (coerced)
//! </person>                   body: rules = rules.take_decorated()
//! ```

use super::top;
use crate::bean::Value;
use crate::engine::{Rules, RulesBase};
use crate::error::{PatternError, RuleError};
use crate::{Attributes, Digester, Rule, RuleRef};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct NestedConfig {
    aliases: HashMap<String, Option<String>>,
    trim: bool,
    allow_unknown: bool,
}

#[derive(Debug, Clone)]
pub struct SetNestedPropertiesRule {
    config: Rc<NestedConfig>,
}

impl Default for SetNestedPropertiesRule {
    fn default() -> Self {
        SetNestedPropertiesRule {
            config: Rc::new(NestedConfig { aliases: HashMap::new(), trim: true, allow_unknown: false }),
        }
    }
}

impl SetNestedPropertiesRule {
    pub fn new() -> Self {
        SetNestedPropertiesRule::default()
    }

    /// Map child element `element` onto `property`.
    pub fn alias(mut self, element: &str, property: &str) -> Self {
        Rc::make_mut(&mut self.config).aliases.insert(element.to_string(), Some(property.to_string()));
        self
    }

    /// Ignore child element `element`.
    pub fn skip(mut self, element: &str) -> Self {
        Rc::make_mut(&mut self.config).aliases.insert(element.to_string(), None);
        self
    }

    /// Trim body text before assignment (default `true`).
    pub fn trim(mut self, trim: bool) -> Self {
        Rc::make_mut(&mut self.config).trim = trim;
        self
    }

    /// Silently skip children without a matching property (default `false`).
    pub fn allow_unknown_child_elements(mut self, allow: bool) -> Self {
        Rc::make_mut(&mut self.config).allow_unknown = allow;
        self
    }
}

impl Rule for SetNestedPropertiesRule {
    fn name(&self) -> &str {
        "SetNestedPropertiesRule"
    }

    fn begin(
        &self,
        digester: &mut Digester,
        _ns: &str,
        _name: &str,
        _attributes: &Attributes,
    ) -> Result<(), RuleError> {
        let prefix = format!("{}/", digester.match_path());
        let child: RuleRef = Rc::new(AnyChildRule { config: self.config.clone() });
        digester
            .install_rules_decorator(|inner| -> Box<dyn Rules> { Box::new(AnyChildRules { inner, prefix, child }) });
        Ok(())
    }

    fn body(&self, digester: &mut Digester, _ns: &str, _name: &str, _text: &str) -> Result<(), RuleError> {
        if !digester.remove_rules_decorator() {
            log::warn!(
                target: "digester::rules",
                "[SetNestedPropertiesRule] no decorator to remove at '{}'",
                digester.match_path()
            );
        }
        Ok(())
    }
}

/// Matcher decorator adding [`AnyChildRule`] for direct children of `prefix`.
struct AnyChildRules {
    inner: Box<dyn Rules>,
    prefix: String,
    child: RuleRef,
}

impl Rules for AnyChildRules {
    fn add(&mut self, pattern: &str, rule: RuleRef) -> Result<(), PatternError> {
        self.inner.add(pattern, rule)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn match_rules(&self, namespace_uri: &str, path: &str, name: &str, attributes: &Attributes) -> Vec<RuleRef> {
        let mut matched = self.inner.match_rules(namespace_uri, path, name, attributes);
        let direct_child = path.strip_prefix(self.prefix.as_str()).is_some_and(|rest| !rest.contains('/'));
        if direct_child {
            matched.push(self.child.clone());
        }
        matched
    }

    fn rules(&self) -> Vec<RuleRef> {
        self.inner.rules()
    }

    fn namespace_uri(&self) -> Option<&str> {
        self.inner.namespace_uri()
    }

    fn set_namespace_uri(&mut self, namespace_uri: Option<&str>) {
        self.inner.set_namespace_uri(namespace_uri);
    }

    fn take_decorated(&mut self) -> Option<Box<dyn Rules>> {
        Some(std::mem::replace(&mut self.inner, Box::new(RulesBase::new())))
    }
}

/// Assigns one child element's body text to a property of the top object.
struct AnyChildRule {
    config: Rc<NestedConfig>,
}

impl Rule for AnyChildRule {
    fn name(&self) -> &str {
        "SetNestedPropertiesRule.child"
    }

    fn body(&self, digester: &mut Digester, _ns: &str, name: &str, text: &str) -> Result<(), RuleError> {
        let property = match self.config.aliases.get(name) {
            Some(Some(alias)) => alias.as_str(),
            Some(None) => return Ok(()),
            None => name,
        };
        let target = top(digester, "SetNestedPropertiesRule")?;
        let invoker = digester.invoker();
        if self.config.allow_unknown && !invoker.is_writable(&target, property) {
            log::debug!(target: "digester::rules", "[SetNestedPropertiesRule] no property '{property}', skipped");
            return Ok(());
        }
        let text = if self.config.trim { text.trim() } else { text };
        invoker.set_property(&target, property, Value::from(text))?;
        Ok(())
    }
}
