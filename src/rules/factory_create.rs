use super::private_stack;
use crate::bean::Value;
use crate::error::RuleError;
use crate::{Attributes, Digester, Rule};
use std::fmt;
use std::rc::Rc;

/// Builds the object for one element occurrence.
///
/// Closures taking the attributes implement it directly; see
/// [`FactoryCreateRule::from_fn`]:
///
/// ```
/// use digester::{DynamicBean, Object, Value};
/// use digester::rules::FactoryCreateRule;
///
/// let rule = FactoryCreateRule::from_fn(|attrs| {
///     let mut bean = DynamicBean::new("item");
///     bean.insert("sku", Value::from(attrs.get("sku").unwrap_or("?")));
///     Ok(Value::Object(Object::new(bean)))
/// });
/// # let _ = rule;
/// ```
pub trait ObjectCreationFactory {
    fn create_object(&self, digester: &Digester, attributes: &Attributes) -> Result<Value, RuleError>;
}

impl<F> ObjectCreationFactory for F
where
    F: Fn(&Attributes) -> Result<Value, RuleError>,
{
    fn create_object(&self, _digester: &Digester, attributes: &Attributes) -> Result<Value, RuleError> {
        self(attributes)
    }
}

#[derive(Clone)]
enum FactorySource {
    Instance(Rc<dyn ObjectCreationFactory>),
    /// Looked up in the digester's factory registry.
    Named { class_name: Option<String>, attribute: Option<String> },
}

/// Pushes the object built by a factory in `begin`, pops it in `end`.
///
/// With [`ignore_create_exceptions`](FactoryCreateRule::ignore_create_exceptions)
/// a failed creation is logged and the element contributes nothing; a
/// per-occurrence flag on a private named stack tells the matching `end`
/// not to pop.
#[derive(Clone)]
pub struct FactoryCreateRule {
    source: FactorySource,
    ignore_create_exceptions: bool,
    created: String,
}

impl FactoryCreateRule {
    fn with_source(source: FactorySource) -> Self {
        FactoryCreateRule { source, ignore_create_exceptions: false, created: private_stack("factory-created") }
    }

    pub fn with_factory(factory: impl ObjectCreationFactory + 'static) -> Self {
        FactoryCreateRule::with_source(FactorySource::Instance(Rc::new(factory)))
    }

    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn(&Attributes) -> Result<Value, RuleError> + 'static,
    {
        FactoryCreateRule::with_factory(factory)
    }

    /// Factory registered on the digester under `class_name`.
    pub fn named(class_name: &str) -> Self {
        let class_name = Some(class_name.to_string());
        FactoryCreateRule::with_source(FactorySource::Named { class_name, attribute: None })
    }

    /// Let `attribute` name the registered factory; only applies to
    /// [`named`](FactoryCreateRule::named) rules.
    pub fn attribute_override(mut self, attr: &str) -> Self {
        if let FactorySource::Named { attribute, .. } = &mut self.source {
            *attribute = Some(attr.to_string());
        }
        self
    }

    pub fn ignore_create_exceptions(mut self, ignore: bool) -> Self {
        self.ignore_create_exceptions = ignore;
        self
    }

    fn create(&self, digester: &Digester, attributes: &Attributes) -> Result<Value, RuleError> {
        match &self.source {
            FactorySource::Instance(factory) => factory.create_object(digester, attributes),
            FactorySource::Named { class_name, attribute } => {
                let name = attribute
                    .as_deref()
                    .and_then(|attr| attributes.get(attr))
                    .or(class_name.as_deref())
                    .ok_or_else(|| RuleError::NoClassName(attribute.clone().unwrap_or_default()))?;
                let factory = digester.factory(name).ok_or_else(|| RuleError::UnknownFactory(name.to_string()))?;
                factory.create_object(digester, attributes)
            }
        }
    }
}

impl fmt::Debug for FactoryCreateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            FactorySource::Instance(_) => "instance".to_string(),
            FactorySource::Named { class_name, attribute } => format!("named({class_name:?}, attr {attribute:?})"),
        };
        f.debug_struct("FactoryCreateRule")
            .field("source", &source)
            .field("ignore_create_exceptions", &self.ignore_create_exceptions)
            .finish()
    }
}

impl Rule for FactoryCreateRule {
    fn name(&self) -> &str {
        "FactoryCreateRule"
    }

    fn begin(&self, digester: &mut Digester, _ns: &str, _name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        match self.create(digester, attributes) {
            Ok(object) => {
                digester.push(object);
                if self.ignore_create_exceptions {
                    digester.push_named(&self.created, true);
                }
                Ok(())
            }
            Err(err) if self.ignore_create_exceptions => {
                log::info!(
                    target: "digester::rules",
                    "[FactoryCreateRule] creation failed at '{}', ignored: {err}",
                    digester.match_path()
                );
                digester.push_named(&self.created, false);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn end(&self, digester: &mut Digester, _ns: &str, _name: &str) -> Result<(), RuleError> {
        if self.ignore_create_exceptions && digester.pop_named(&self.created)? == Value::Bool(false) {
            log::debug!(target: "digester::rules", "[FactoryCreateRule] nothing was created, skipping pop");
            return Ok(());
        }
        digester.pop();
        Ok(())
    }
}
