//! Rule-driven mapping of XML element events onto an object graph.
//!
//! A [`Digester`] receives SAX-style events (`start_element`, `characters`,
//! `end_element`, ...) from an event source, keeps the current element path
//! (`"catalog/book/title"`), asks a pluggable [`Rules`] matcher which
//! [`Rule`]s apply to that path and fires their `begin`/`body`/`end`
//! callbacks. The standard rules in [`rules`] create objects, bind
//! attributes and child text to properties and wire parents to children,
//! using the object stack, parameter stack and named stacks kept by the
//! digester.
//!
//! ```text
//! XML ──> source (quick-xml) ──> Digester ──┬─> Rules::match_rules(path)
//!                                           └─> Rule::begin/body/end/finish
//!                                                    │
//!                                                    v
//!                                       object stack ─> root Value
//! ```
//!
//! The reflective side ("set property `name` on whatever is on top of the
//! stack") goes through the [`Bean`] trait and the [`Invoker`] capability so
//! the dispatch core never depends on how a target type exposes itself.

extern crate self as digester;

#[macro_use]
mod macros;
mod api;
pub mod bean;
mod convert;
mod engine;
pub mod error;
pub mod node;
pub mod rules;
mod source;
pub mod substitution;

#[cfg(test)]
mod test_support;

pub use api::{
    Options, ParseDetails, ParseResult, ParseResultVerbose, generic_rules, parse, parse_verbose, parse_verbose_with,
    parse_with,
};
pub use bean::{Bean, BeanInvoker, ClassRegistry, DynamicBean, Invoker, Object, Value, ValueType};
pub use convert::coerce;
pub use engine::{
    CompiledMatcher, Digester, ElementTrace, ExtendedBaseRules, GlobMatcher, NamedStacks, ParseMetrics, RegexMatcher,
    RegexRules, RuleEntry, Rules, RulesBase, Stack, StringMatcher, WithDefaultsRulesWrapper,
};
pub use error::{ConversionError, DigestError, EmptyStackError, InvokeError, PatternError, Phase, RuleError};

use std::rc::Rc;

// --- Positions and attributes ------------------------------------------------

/// Line/column of the event currently being dispatched (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// One attribute of a start-element event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Namespace URI, empty when the attribute is unqualified.
    pub namespace_uri: String,
    pub local_name: String,
    pub qname: String,
    pub value: String,
}

/// Ordered attribute list of a start-element event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    items: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes { items: Vec::new() }
    }

    /// Append an unqualified attribute.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.push(Attribute {
            namespace_uri: String::new(),
            local_name: name.to_string(),
            qname: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn push(&mut self, attribute: Attribute) {
        self.items.push(attribute);
    }

    /// Look up a value by local name, falling back to the qualified name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|a| a.local_name == name)
            .or_else(|| self.items.iter().find(|a| a.qname == name))
            .map(|a| a.value.as_str())
    }

    /// Look up a value by namespace URI and local name.
    pub fn get_ns(&self, namespace_uri: &str, local_name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|a| a.namespace_uri == namespace_uri && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copy with every value passed through `f`.
    pub fn map_values(&self, mut f: impl FnMut(&str) -> String) -> Attributes {
        Attributes { items: self.items.iter().map(|a| Attribute { value: f(&a.value), ..a.clone() }).collect() }
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// --- Rule --------------------------------------------------------------------

/// Shared handle to a registered rule.
///
/// One instance may be registered under several patterns and may match at
/// several nesting depths at once, so rules take `&self`: whatever state
/// must survive from `begin` to `end` lives on the digester's stacks.
pub type RuleRef = Rc<dyn Rule>;

/// A pattern-bound callback fired by the [`Digester`].
///
/// `namespace` is the element's namespace URI (empty when none) and `name`
/// its local name. Callbacks for one element fire in this order:
///
/// ```text
/// begin   (registration order, at start tag)
/// body    (registration order, at end tag, with the element's own text)
/// end     (reverse registration order, at end tag)
/// finish  (once per registered rule, at end of document)
/// ```
pub trait Rule {
    /// Name used in logs, traces and error messages.
    fn name(&self) -> &str {
        "Rule"
    }

    fn begin(
        &self,
        _digester: &mut Digester,
        _namespace: &str,
        _name: &str,
        _attributes: &Attributes,
    ) -> Result<(), RuleError> {
        Ok(())
    }

    fn body(&self, _digester: &mut Digester, _namespace: &str, _name: &str, _text: &str) -> Result<(), RuleError> {
        Ok(())
    }

    fn end(&self, _digester: &mut Digester, _namespace: &str, _name: &str) -> Result<(), RuleError> {
        Ok(())
    }

    fn finish(&self, _digester: &mut Digester) -> Result<(), RuleError> {
        Ok(())
    }
}
