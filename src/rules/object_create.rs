use crate::error::RuleError;
use crate::{Attributes, Digester, Rule};

/// Instantiates a registered class in `begin`, pushes it, pops it in `end`.
///
/// The class name comes from the attribute named by
/// [`attribute_override`](ObjectCreateRule::attribute_override) when the
/// element carries it, otherwise from the configured name.
#[derive(Debug, Clone)]
pub struct ObjectCreateRule {
    class_name: Option<String>,
    attribute: Option<String>,
}

impl ObjectCreateRule {
    pub fn new(class_name: &str) -> Self {
        ObjectCreateRule { class_name: Some(class_name.to_string()), attribute: None }
    }

    /// Class name taken only from `attribute`; elements without it fail.
    pub fn from_attribute(attribute: &str) -> Self {
        ObjectCreateRule { class_name: None, attribute: Some(attribute.to_string()) }
    }

    pub fn attribute_override(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    fn class_for<'a>(&'a self, attributes: &'a Attributes) -> Result<&'a str, RuleError> {
        self.attribute
            .as_deref()
            .and_then(|attr| attributes.get(attr))
            .or(self.class_name.as_deref())
            .ok_or_else(|| RuleError::NoClassName(self.attribute.clone().unwrap_or_default()))
    }
}

impl Rule for ObjectCreateRule {
    fn name(&self) -> &str {
        "ObjectCreateRule"
    }

    fn begin(&self, digester: &mut Digester, _ns: &str, _name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        let class = self.class_for(attributes)?;
        let object = digester.classes().instantiate(class).ok_or_else(|| RuleError::UnknownClass(class.to_string()))?;
        log::debug!(target: "digester::rules", "[ObjectCreateRule] new {class} at '{}'", digester.match_path());
        digester.push(object);
        Ok(())
    }

    fn end(&self, digester: &mut Digester, _ns: &str, _name: &str) -> Result<(), RuleError> {
        digester.pop();
        Ok(())
    }
}
