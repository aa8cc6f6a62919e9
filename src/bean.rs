//! Object model for the values the digester moves around.
//!
//! The dispatch core never inspects target objects itself. Objects are
//! [`Bean`]s behind a shared [`Object`] handle; rules reach them through the
//! [`Invoker`] capability held by the digester:
//!
//! ```text
//! SetPropertiesRule ──> Invoker::set_property(top, "title", "Dune")
//!                          │ property_type("title") -> Some(Str)
//!                          │ coerce("Dune", Str)
//!                          └─> Bean::set_property("title", Str("Dune"))
//! ```
//!
//! A type becomes a target by implementing [`Bean`]: it declares which
//! properties are writable (and with which [`ValueType`]) and which methods
//! it answers to. [`DynamicBean`] is a ready-made bag-of-properties bean.

use crate::convert;
use crate::error::{ConversionError, InvokeError};
use crate::node::XmlNode;
use chrono::{NaiveDate, NaiveDateTime};
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

// --- Values ------------------------------------------------------------------

/// Target type for string coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Keep the value as-is (no coercion).
    Any,
    Str,
    Bool,
    Int,
    Float,
    Char,
    Date,
    DateTime,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Any => "any",
            ValueType::Str => "string",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Char => "char",
            ValueType::Date => "date",
            ValueType::DateTime => "datetime",
        };
        f.write_str(s)
    }
}

/// A dynamically typed value on the digester's stacks.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<Value>),
    Node(Rc<XmlNode>),
    Object(Object),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&XmlNode> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short type label for diagnostics.
    pub fn kind(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Date(_) => "date".to_string(),
            Value::DateTime(_) => "datetime".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Node(_) => "node".to_string(),
            Value::Object(o) => o.type_name(),
        }
    }

    /// Take the string out, or fail with a conversion error naming `target`.
    pub fn into_string(self) -> Result<String, ConversionError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(ConversionError { value: other.to_string(), target: ValueType::Str }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Node(n) => write!(f, "<{}>", n.name()),
            Value::Object(o) => write!(f, "{}@{:p}", o.type_name(), Rc::as_ptr(&o.0)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<XmlNode> for Value {
    fn from(n: XmlNode) -> Self {
        Value::Node(Rc::new(n))
    }
}

// --- Beans -------------------------------------------------------------------

/// Upcast helper so `dyn Bean` can be downcast to its concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Introspection surface of a digestible type.
///
/// Every method has a "not supported" default, so a type only spells out
/// the properties and methods it actually exposes:
///
/// ```
/// use digester::{Bean, InvokeError, Value, ValueType};
///
/// #[derive(Debug, Default)]
/// struct Book { title: String, pages: i64 }
///
/// impl Bean for Book {
///     fn type_name(&self) -> &str { "Book" }
///
///     fn property_type(&self, name: &str) -> Option<ValueType> {
///         match name {
///             "title" => Some(ValueType::Str),
///             "pages" => Some(ValueType::Int),
///             _ => None,
///         }
///     }
///
///     fn set_property(&mut self, name: &str, value: Value) -> Result<(), InvokeError> {
///         match (name, value) {
///             ("title", Value::Str(s)) => self.title = s,
///             ("pages", Value::Int(n)) => self.pages = n,
///             (name, _) => return Err(self.no_such_property(name)),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Bean: AsAny + fmt::Debug {
    fn type_name(&self) -> &str;

    /// Declared type of a writable property, `None` when there is no such property.
    fn property_type(&self, _name: &str) -> Option<ValueType> {
        None
    }

    /// Assign an already coerced value.
    fn set_property(&mut self, name: &str, _value: Value) -> Result<(), InvokeError> {
        Err(self.no_such_property(name))
    }

    fn get_property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Parameter types of `method` when called with `arity` arguments.
    ///
    /// `None` means the bean does not declare them; arguments are then passed
    /// through with the caller's types.
    fn method_signature(&self, _method: &str, _arity: usize) -> Option<Vec<ValueType>> {
        None
    }

    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        Err(InvokeError::NoSuchMethod {
            type_name: self.type_name().to_string(),
            method: method.to_string(),
            arity: args.len(),
        })
    }

    fn no_such_property(&self, name: &str) -> InvokeError {
        InvokeError::NoSuchProperty { type_name: self.type_name().to_string(), property: name.to_string() }
    }
}

/// Shared, interior-mutable handle to a bean.
#[derive(Clone)]
pub struct Object(Rc<RefCell<dyn Bean>>);

impl Object {
    pub fn new<T: Bean>(bean: T) -> Self {
        Object(Rc::new(RefCell::new(bean)))
    }

    pub fn type_name(&self) -> String {
        match self.0.try_borrow() {
            Ok(bean) => bean.type_name().to_string(),
            Err(_) => "<borrowed>".to_string(),
        }
    }

    pub fn borrow(&self) -> Ref<'_, dyn Bean> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn Bean> {
        self.0.borrow_mut()
    }

    /// Mutable access, reporting a re-entrant borrow as an error.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, dyn Bean>, InvokeError> {
        self.0.try_borrow_mut().map_err(|_| InvokeError::Busy { type_name: self.type_name() })
    }

    /// Run `f` against the concrete bean if it is a `T`.
    pub fn with<T: Bean, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.0.borrow();
        <dyn Bean as AsAny>::as_any(&*guard).downcast_ref::<T>().map(f)
    }

    /// Run `f` against the concrete bean mutably if it is a `T`.
    pub fn with_mut<T: Bean, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.0.borrow_mut();
        <dyn Bean as AsAny>::as_any_mut(&mut *guard).downcast_mut::<T>().map(f)
    }

    pub fn is<T: Bean>(&self) -> bool {
        self.with::<T, _>(|_| ()).is_some()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(bean) => fmt::Debug::fmt(&*bean, f),
            Err(_) => f.write_str("Object(<borrowed>)"),
        }
    }
}

// --- DynamicBean -------------------------------------------------------------

/// A bean whose properties are a name -> value map.
///
/// Method conventions: `setX(v)` assigns property `x`, `addX(v)` appends to
/// list property `x`, and `addChild(v)` appends to [`DynamicBean::children`].
/// With [`DynamicBean::with_properties`] only the declared properties are
/// writable; otherwise any name is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicBean {
    type_name: String,
    declared: Option<BTreeMap<String, ValueType>>,
    properties: BTreeMap<String, Value>,
    children: Vec<Value>,
}

impl DynamicBean {
    pub fn new(type_name: &str) -> Self {
        DynamicBean {
            type_name: type_name.to_string(),
            declared: None,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Bean with a fixed set of typed properties.
    pub fn with_properties(type_name: &str, properties: &[(&str, ValueType)]) -> Self {
        let declared = properties.iter().map(|(name, ty)| (name.to_string(), *ty)).collect();
        DynamicBean { declared: Some(declared), ..DynamicBean::new(type_name) }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn children(&self) -> &[Value] {
        &self.children
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_string(), value);
    }
}

fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Bean for DynamicBean {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn property_type(&self, name: &str) -> Option<ValueType> {
        match &self.declared {
            Some(declared) => declared.get(name).copied(),
            None => Some(ValueType::Any),
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), InvokeError> {
        if self.property_type(name).is_none() {
            return Err(self.no_such_property(name));
        }
        self.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        self.properties.get(name).cloned()
    }

    fn invoke(&mut self, method: &str, mut args: Vec<Value>) -> Result<Value, InvokeError> {
        if args.len() == 1 {
            if method == "addChild" {
                self.children.push(args.remove(0));
                return Ok(Value::Null);
            }
            if let Some(prop) = method.strip_prefix("set").filter(|p| !p.is_empty()) {
                self.set_property(&decapitalize(prop), args.remove(0))?;
                return Ok(Value::Null);
            }
            if let Some(prop) = method.strip_prefix("add").filter(|p| !p.is_empty()) {
                let prop = decapitalize(prop);
                if self.property_type(&prop).is_none() {
                    return Err(self.no_such_property(&prop));
                }
                let slot = self.properties.entry(prop).or_insert_with(|| Value::List(Vec::new()));
                match slot {
                    Value::List(items) => items.push(args.remove(0)),
                    other => {
                        let previous = std::mem::replace(other, Value::Null);
                        *other = Value::List(vec![previous, args.remove(0)]);
                    }
                }
                return Ok(Value::Null);
            }
        }
        if args.is_empty() {
            if let Some(prop) = method.strip_prefix("get").filter(|p| !p.is_empty()) {
                return Ok(self.properties.get(&decapitalize(prop)).cloned().unwrap_or(Value::Null));
            }
        }
        Err(InvokeError::NoSuchMethod {
            type_name: self.type_name.clone(),
            method: method.to_string(),
            arity: args.len(),
        })
    }
}

// --- Invoker -----------------------------------------------------------------

/// Reflective capability used by the standard rules.
pub trait Invoker {
    /// Call `method` on `target`. Each argument is coerced to the matching
    /// entry of `param_types` (or of the bean's declared signature when
    /// `param_types` is empty).
    fn invoke(
        &self,
        target: &Value,
        method: &str,
        args: Vec<Value>,
        param_types: &[ValueType],
    ) -> Result<Value, InvokeError>;

    /// Coerce `value` to the property's declared type and assign it.
    fn set_property(&self, target: &Value, name: &str, value: Value) -> Result<(), InvokeError>;

    fn is_writable(&self, target: &Value, name: &str) -> bool;

    fn coerce(&self, value: Value, ty: ValueType) -> Result<Value, InvokeError> {
        Ok(convert::coerce(value, ty)?)
    }
}

/// The default [`Invoker`], dispatching straight to [`Bean`] methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeanInvoker;

fn target_object(target: &Value) -> Result<&Object, InvokeError> {
    target.as_object().ok_or_else(|| InvokeError::NotAnObject { found: target.kind() })
}

impl Invoker for BeanInvoker {
    fn invoke(
        &self,
        target: &Value,
        method: &str,
        args: Vec<Value>,
        param_types: &[ValueType],
    ) -> Result<Value, InvokeError> {
        let object = target_object(target)?;
        let mut bean = object.try_borrow_mut()?;
        let declared;
        let types = if param_types.is_empty() {
            declared = bean.method_signature(method, args.len()).unwrap_or_default();
            declared.as_slice()
        } else {
            param_types
        };
        let mut coerced = Vec::with_capacity(args.len());
        for (idx, arg) in args.into_iter().enumerate() {
            let ty = types.get(idx).copied().unwrap_or(ValueType::Any);
            coerced.push(self.coerce(arg, ty)?);
        }
        log::trace!(target: "digester::rules", "invoke {}.{}({} args)", bean.type_name(), method, coerced.len());
        bean.invoke(method, coerced)
    }

    fn set_property(&self, target: &Value, name: &str, value: Value) -> Result<(), InvokeError> {
        let object = target_object(target)?;
        let mut bean = object.try_borrow_mut()?;
        let ty = bean.property_type(name).ok_or_else(|| bean.no_such_property(name))?;
        let value = self.coerce(value, ty)?;
        bean.set_property(name, value)
    }

    fn is_writable(&self, target: &Value, name: &str) -> bool {
        match target.as_object() {
            Some(object) => object.0.try_borrow().map(|bean| bean.property_type(name).is_some()).unwrap_or(false),
            None => false,
        }
    }
}

// --- Class registry ----------------------------------------------------------

type Constructor = Rc<dyn Fn() -> Object>;

/// Class-loading strategy: resolves class names to no-arg constructors.
#[derive(Clone, Default)]
pub struct ClassRegistry {
    constructors: HashMap<String, Constructor>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry::default()
    }

    /// Register `T::default()` under `name`.
    pub fn register<T: Bean + Default>(&mut self, name: &str) {
        self.constructors.insert(name.to_string(), Rc::new(|| Object::new(T::default())));
    }

    pub fn register_with(&mut self, name: &str, constructor: impl Fn() -> Object + 'static) {
        self.constructors.insert(name.to_string(), Rc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Instantiate `name`, `None` when the class is unknown.
    pub fn instantiate(&self, name: &str) -> Option<Object> {
        self.constructors.get(name).map(|ctor| ctor())
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("ClassRegistry").field("classes", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Person;

    #[test]
    fn object_downcast_and_identity() {
        let obj = Object::new(Person::default());
        assert!(obj.is::<Person>());
        assert!(!obj.is::<DynamicBean>());
        obj.with_mut::<Person, _>(|p| p.name = "Ada".to_string());
        assert_eq!(obj.with::<Person, _>(|p| p.name.clone()), Some("Ada".to_string()));

        let same = obj.clone();
        assert!(same.ptr_eq(&obj));
        assert_ne!(Value::Object(obj), Value::Object(Object::new(Person::default())));
    }

    #[test]
    fn invoker_coerces_property_values() {
        let target = Value::Object(Object::new(Person::default()));
        BeanInvoker.set_property(&target, "age", Value::from("42")).unwrap();
        assert_eq!(target.as_object().unwrap().with::<Person, _>(|p| p.age), Some(42));

        let err = BeanInvoker.set_property(&target, "age", Value::from("old")).unwrap_err();
        assert!(matches!(err, InvokeError::Conversion(_)));

        let err = BeanInvoker.set_property(&target, "height", Value::from("2")).unwrap_err();
        assert!(matches!(err, InvokeError::NoSuchProperty { .. }));
        assert!(!BeanInvoker.is_writable(&target, "height"));
        assert!(BeanInvoker.is_writable(&target, "name"));
    }

    #[test]
    fn invoker_uses_declared_signature() {
        let target = Value::Object(Object::new(Person::default()));
        BeanInvoker.invoke(&target, "setAge", vec![Value::from("7")], &[]).unwrap();
        assert_eq!(target.as_object().unwrap().with::<Person, _>(|p| p.age), Some(7));
    }

    #[test]
    fn invoker_rejects_non_objects() {
        let err = BeanInvoker.invoke(&Value::from("x"), "go", vec![], &[]).unwrap_err();
        assert_eq!(err, InvokeError::NotAnObject { found: "string".to_string() });
    }

    #[test]
    fn reentrant_call_is_reported() {
        let obj = Object::new(DynamicBean::new("loop"));
        let target = Value::Object(obj.clone());
        let _guard = obj.borrow_mut();
        let err = BeanInvoker.invoke(&target, "addChild", vec![Value::Null], &[]).unwrap_err();
        assert!(matches!(err, InvokeError::Busy { .. }));
    }

    #[test]
    fn dynamic_bean_conventions() {
        let mut bean = DynamicBean::new("item");
        bean.invoke("setTitle", vec![Value::from("a")]).unwrap();
        bean.invoke("addTag", vec![Value::from("x")]).unwrap();
        bean.invoke("addTag", vec![Value::from("y")]).unwrap();
        bean.invoke("addChild", vec![Value::Int(1)]).unwrap();

        assert_eq!(bean.get("title"), Some(&Value::from("a")));
        assert_eq!(bean.get("tag"), Some(&Value::List(vec![Value::from("x"), Value::from("y")])));
        assert_eq!(bean.children(), &[Value::Int(1)]);
        assert_eq!(bean.invoke("getTitle", vec![]).unwrap(), Value::from("a"));
        assert!(bean.invoke("frobnicate", vec![]).is_err());
    }

    #[test]
    fn declared_dynamic_bean_rejects_unknown_properties() {
        let target = Value::Object(Object::new(DynamicBean::with_properties(
            "point",
            &[("x", ValueType::Int), ("y", ValueType::Int)],
        )));
        BeanInvoker.set_property(&target, "x", Value::from("3")).unwrap();
        assert!(BeanInvoker.set_property(&target, "z", Value::from("1")).is_err());
        let x = target.as_object().unwrap().with::<DynamicBean, _>(|b| b.get("x").cloned());
        assert_eq!(x, Some(Some(Value::Int(3))));
    }

    #[test]
    fn class_registry_instantiates_fresh_objects() {
        let mut classes = ClassRegistry::new();
        classes.register::<Person>("Person");
        classes.register_with("Thing", || Object::new(DynamicBean::new("Thing")));

        let a = classes.instantiate("Person").unwrap();
        let b = classes.instantiate("Person").unwrap();
        assert!(!a.ptr_eq(&b));
        assert_eq!(classes.instantiate("Thing").unwrap().type_name(), "Thing");
        assert!(classes.instantiate("Nope").is_none());
        assert!(classes.contains("Person"));
    }
}
