use super::private_stack;
use crate::bean::Value;
use crate::error::RuleError;
use crate::{Attributes, Digester, Rule};

// --- CallParamRule -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamSource {
    /// Trimmed body text, stored at `end`.
    Body,
    Attribute(String),
    /// Object at this depth of the object stack, taken at `begin`.
    Stack(usize),
}

/// Fills one slot of the enclosing [`CallMethodRule`](super::CallMethodRule)'s
/// parameter frame.
#[derive(Debug, Clone)]
pub struct CallParamRule {
    index: usize,
    source: ParamSource,
    texts: String,
}

impl CallParamRule {
    fn with_source(index: usize, source: ParamSource) -> Self {
        CallParamRule { index, source, texts: private_stack("call-param-text") }
    }

    pub fn body(index: usize) -> Self {
        CallParamRule::with_source(index, ParamSource::Body)
    }

    /// Slot stays untouched when the element lacks `attribute`.
    pub fn attribute(index: usize, attribute: &str) -> Self {
        CallParamRule::with_source(index, ParamSource::Attribute(attribute.to_string()))
    }

    pub fn stack(index: usize, stack_index: usize) -> Self {
        CallParamRule::with_source(index, ParamSource::Stack(stack_index))
    }
}

impl Rule for CallParamRule {
    fn name(&self) -> &str {
        "CallParamRule"
    }

    fn begin(&self, digester: &mut Digester, _ns: &str, _name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        match &self.source {
            ParamSource::Attribute(attr) => {
                if let Some(value) = attributes.get(attr) {
                    digester.set_param(self.index, Value::from(value))?;
                }
            }
            ParamSource::Stack(depth) => {
                let value = digester.peek_at(*depth).cloned().unwrap_or(Value::Null);
                digester.set_param(self.index, value)?;
            }
            ParamSource::Body => {}
        }
        Ok(())
    }

    fn body(&self, digester: &mut Digester, _ns: &str, _name: &str, text: &str) -> Result<(), RuleError> {
        if self.source == ParamSource::Body {
            digester.push_named(&self.texts, text.trim());
        }
        Ok(())
    }

    fn end(&self, digester: &mut Digester, _ns: &str, _name: &str) -> Result<(), RuleError> {
        if self.source == ParamSource::Body {
            let text = digester.pop_named(&self.texts)?;
            digester.set_param(self.index, text)?;
        }
        Ok(())
    }
}

// --- ObjectParamRule ---------------------------------------------------------

/// Puts a fixed value into a parameter slot, optionally only when the element
/// carries a given attribute.
#[derive(Debug, Clone)]
pub struct ObjectParamRule {
    index: usize,
    value: Value,
    attribute: Option<String>,
}

impl ObjectParamRule {
    pub fn new(index: usize, value: impl Into<Value>) -> Self {
        ObjectParamRule { index, value: value.into(), attribute: None }
    }

    pub fn when_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }
}

impl Rule for ObjectParamRule {
    fn name(&self) -> &str {
        "ObjectParamRule"
    }

    fn begin(&self, digester: &mut Digester, _ns: &str, _name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        let present = self.attribute.as_deref().is_none_or(|attr| attributes.get(attr).is_some());
        if present {
            digester.set_param(self.index, self.value.clone())?;
        }
        Ok(())
    }
}

// --- PathCallParamRule -------------------------------------------------------

/// Puts the current match path into a parameter slot.
#[derive(Debug, Clone)]
pub struct PathCallParamRule {
    index: usize,
}

impl PathCallParamRule {
    pub fn new(index: usize) -> Self {
        PathCallParamRule { index }
    }
}

impl Rule for PathCallParamRule {
    fn name(&self) -> &str {
        "PathCallParamRule"
    }

    fn begin(
        &self,
        digester: &mut Digester,
        _ns: &str,
        _name: &str,
        _attributes: &Attributes,
    ) -> Result<(), RuleError> {
        let path = Value::from(digester.match_path());
        digester.set_param(self.index, path)?;
        Ok(())
    }
}
