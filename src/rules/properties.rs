use super::{private_stack, top};
use crate::bean::Value;
use crate::error::RuleError;
use crate::{Attributes, Digester, Rule};
use std::collections::HashMap;

// --- SetPropertiesRule -------------------------------------------------------

/// Copies every attribute onto the same-named property of the top object.
///
/// Attributes can be renamed with [`alias`](SetPropertiesRule::alias) or
/// skipped with [`skip`](SetPropertiesRule::skip). An attribute without a
/// writable property is an error unless
/// [`ignore_missing_property`](SetPropertiesRule::ignore_missing_property)
/// is set.
#[derive(Debug, Clone, Default)]
pub struct SetPropertiesRule {
    aliases: HashMap<String, Option<String>>,
    ignore_missing: bool,
}

impl SetPropertiesRule {
    pub fn new() -> Self {
        SetPropertiesRule::default()
    }

    pub fn alias(mut self, attribute: &str, property: &str) -> Self {
        self.aliases.insert(attribute.to_string(), Some(property.to_string()));
        self
    }

    pub fn skip(mut self, attribute: &str) -> Self {
        self.aliases.insert(attribute.to_string(), None);
        self
    }

    pub fn ignore_missing_property(mut self, ignore: bool) -> Self {
        self.ignore_missing = ignore;
        self
    }

    fn property_for<'a>(&'a self, attribute: &'a str) -> Option<&'a str> {
        match self.aliases.get(attribute) {
            Some(alias) => alias.as_deref(),
            None => Some(attribute),
        }
    }
}

impl Rule for SetPropertiesRule {
    fn name(&self) -> &str {
        "SetPropertiesRule"
    }

    fn begin(&self, digester: &mut Digester, _ns: &str, _name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        let target = top(digester, "SetPropertiesRule")?;
        let invoker = digester.invoker();
        for attr in attributes {
            let attr_name = if attr.local_name.is_empty() { &attr.qname } else { &attr.local_name };
            let Some(property) = self.property_for(attr_name) else { continue };
            if self.ignore_missing && !invoker.is_writable(&target, property) {
                log::debug!(target: "digester::rules", "[SetPropertiesRule] no property '{property}', skipped");
                continue;
            }
            invoker.set_property(&target, property, Value::from(attr.value.as_str()))?;
        }
        Ok(())
    }
}

// --- SetPropertyRule ---------------------------------------------------------

/// Sets one property whose name and value both come from attributes, e.g.
/// `<set name="color" value="red"/>`.
#[derive(Debug, Clone)]
pub struct SetPropertyRule {
    name_attr: String,
    value_attr: String,
}

impl SetPropertyRule {
    pub fn new(name_attr: &str, value_attr: &str) -> Self {
        SetPropertyRule { name_attr: name_attr.to_string(), value_attr: value_attr.to_string() }
    }
}

impl Rule for SetPropertyRule {
    fn name(&self) -> &str {
        "SetPropertyRule"
    }

    fn begin(&self, digester: &mut Digester, _ns: &str, _name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        let Some(property) = attributes.get(&self.name_attr) else {
            log::debug!(target: "digester::rules", "[SetPropertyRule] no '{}' attribute, skipped", self.name_attr);
            return Ok(());
        };
        let value = attributes.get(&self.value_attr).map_or(Value::Null, Value::from);
        let target = top(digester, "SetPropertyRule")?;
        digester.invoker().set_property(&target, property, value)?;
        Ok(())
    }
}

// --- BeanPropertySetterRule --------------------------------------------------

/// Sets a property of the top object from the element's trimmed body text.
///
/// The property defaults to the element's own name.
#[derive(Debug, Clone)]
pub struct BeanPropertySetterRule {
    property: Option<String>,
    texts: String,
}

impl Default for BeanPropertySetterRule {
    fn default() -> Self {
        BeanPropertySetterRule { property: None, texts: private_stack("bean-property-text") }
    }
}

impl BeanPropertySetterRule {
    pub fn new() -> Self {
        BeanPropertySetterRule::default()
    }

    pub fn for_property(property: &str) -> Self {
        BeanPropertySetterRule { property: Some(property.to_string()), ..BeanPropertySetterRule::default() }
    }
}

impl Rule for BeanPropertySetterRule {
    fn name(&self) -> &str {
        "BeanPropertySetterRule"
    }

    fn body(&self, digester: &mut Digester, _ns: &str, _name: &str, text: &str) -> Result<(), RuleError> {
        digester.push_named(&self.texts, text.trim());
        Ok(())
    }

    fn end(&self, digester: &mut Digester, _ns: &str, name: &str) -> Result<(), RuleError> {
        let text = digester.pop_named(&self.texts)?;
        let property = self.property.as_deref().unwrap_or(name);
        let target = top(digester, "BeanPropertySetterRule")?;
        digester.invoker().set_property(&target, property, text)?;
        Ok(())
    }
}
