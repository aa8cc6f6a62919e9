use super::top;
use crate::bean::{Value, ValueType};
use crate::error::RuleError;
use crate::{Attributes, Digester, Rule};

/// Which stack objects a [`LinkRule`] connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    /// `peek(1).method(peek(0))`: hand the child to its parent.
    Next,
    /// `root.method(peek(0))`.
    Root,
    /// `peek(0).method(peek(1))`: hand the parent to the child.
    Top,
}

/// Calls a one-argument method to wire two stack objects together.
///
/// Fires in `end` by default, so the child is fully populated before it is
/// handed over; [`fire_on_begin`](LinkRule::fire_on_begin) moves it to
/// `begin`.
#[derive(Debug, Clone)]
pub struct LinkRule {
    target: LinkTarget,
    method: String,
    param_type: Option<ValueType>,
    fire_on_begin: bool,
}

impl LinkRule {
    pub fn new(target: LinkTarget, method: &str) -> Self {
        LinkRule { target, method: method.to_string(), param_type: None, fire_on_begin: false }
    }

    pub fn set_next(method: &str) -> Self {
        LinkRule::new(LinkTarget::Next, method)
    }

    pub fn set_root(method: &str) -> Self {
        LinkRule::new(LinkTarget::Root, method)
    }

    pub fn set_top(method: &str) -> Self {
        LinkRule::new(LinkTarget::Top, method)
    }

    pub fn param_type(mut self, ty: ValueType) -> Self {
        self.param_type = Some(ty);
        self
    }

    pub fn fire_on_begin(mut self, fire_on_begin: bool) -> Self {
        self.fire_on_begin = fire_on_begin;
        self
    }

    fn link(&self, digester: &mut Digester) -> Result<(), RuleError> {
        let rule = self.static_name();
        let child = top(digester, rule)?;
        let (target, arg) = match self.target {
            LinkTarget::Next => (digester.peek_at(1).cloned().ok_or(RuleError::NothingOnStack(rule))?, child),
            LinkTarget::Root => (digester.root().cloned().ok_or(RuleError::NothingOnStack(rule))?, child),
            LinkTarget::Top => {
                let parent = digester.peek_at(1).cloned().unwrap_or(Value::Null);
                (child, parent)
            }
        };
        log::debug!(target: "digester::rules", "[{rule}] {}.{}({})", target.kind(), self.method, arg.kind());
        let types: Vec<ValueType> = self.param_type.into_iter().collect();
        digester.invoker().invoke(&target, &self.method, vec![arg], &types)?;
        Ok(())
    }

    fn static_name(&self) -> &'static str {
        match self.target {
            LinkTarget::Next => "SetNextRule",
            LinkTarget::Root => "SetRootRule",
            LinkTarget::Top => "SetTopRule",
        }
    }
}

impl Rule for LinkRule {
    fn name(&self) -> &str {
        self.static_name()
    }

    fn begin(
        &self,
        digester: &mut Digester,
        _ns: &str,
        _name: &str,
        _attributes: &Attributes,
    ) -> Result<(), RuleError> {
        if self.fire_on_begin { self.link(digester) } else { Ok(()) }
    }

    fn end(&self, digester: &mut Digester, _ns: &str, _name: &str) -> Result<(), RuleError> {
        if self.fire_on_begin { Ok(()) } else { self.link(digester) }
    }
}
