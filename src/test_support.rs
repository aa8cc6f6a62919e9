//! Fixtures shared by the unit tests.

use crate::bean::{Bean, Object, Value, ValueType};
use crate::error::{InvokeError, RuleError};
use crate::{Attributes, Digester, Rule, RuleRef};
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) type Log = Rc<RefCell<Vec<String>>>;

pub(crate) fn names(rules: &[RuleRef]) -> Vec<String> {
    rules.iter().map(|r| r.name().to_string()).collect()
}

// --- Rules -------------------------------------------------------------------

/// Appends one line per callback to a shared log.
pub(crate) struct Recorder {
    name: String,
    log: Log,
}

impl Recorder {
    pub(crate) fn new(name: &str) -> (Recorder, Log) {
        let log: Log = Rc::default();
        (Recorder { name: name.to_string(), log: log.clone() }, log)
    }

    /// Another recorder writing to the same log.
    pub(crate) fn sibling(&self, name: &str) -> Recorder {
        Recorder { name: name.to_string(), log: self.log.clone() }
    }

    fn record(&self, line: String) {
        self.log.borrow_mut().push(format!("{}.{}", self.name, line));
    }
}

impl Rule for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin(&self, _d: &mut Digester, namespace: &str, name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        self.record(format!("begin({name})"));
        if !namespace.is_empty() {
            self.record(format!("ns({namespace})"));
        }
        for attr in attributes {
            let key = if attr.local_name.is_empty() { &attr.qname } else { &attr.local_name };
            self.record(format!("attr({key}={})", attr.value));
        }
        Ok(())
    }

    fn body(&self, _d: &mut Digester, _ns: &str, name: &str, text: &str) -> Result<(), RuleError> {
        self.record(format!("body({name}, {text:?})"));
        Ok(())
    }

    fn end(&self, _d: &mut Digester, _ns: &str, name: &str) -> Result<(), RuleError> {
        self.record(format!("end({name})"));
        Ok(())
    }

    fn finish(&self, _d: &mut Digester) -> Result<(), RuleError> {
        self.record("finish".to_string());
        Ok(())
    }
}

/// Fails in `end` with a custom message.
pub(crate) struct Scripted {
    message: String,
}

impl Scripted {
    pub(crate) fn failing_end(message: &str) -> Scripted {
        Scripted { message: message.to_string() }
    }
}

impl Rule for Scripted {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn end(&self, _d: &mut Digester, _ns: &str, _name: &str) -> Result<(), RuleError> {
        Err(RuleError::Custom(self.message.clone()))
    }
}

// --- Beans -------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Person {
    pub(crate) name: String,
    pub(crate) age: i64,
    pub(crate) nickname: Option<String>,
}

impl Bean for Person {
    fn type_name(&self) -> &str {
        "Person"
    }

    fn property_type(&self, name: &str) -> Option<ValueType> {
        match name {
            "name" | "nickname" => Some(ValueType::Str),
            "age" => Some(ValueType::Int),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), InvokeError> {
        match (name, value) {
            ("name", Value::Str(s)) => self.name = s,
            ("nickname", Value::Str(s)) => self.nickname = Some(s),
            ("age", Value::Int(n)) => self.age = n,
            (name, _) => return Err(self.no_such_property(name)),
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "age" => Some(Value::Int(self.age)),
            _ => None,
        }
    }

    fn method_signature(&self, method: &str, arity: usize) -> Option<Vec<ValueType>> {
        match (method, arity) {
            ("setName", 1) => Some(vec![ValueType::Str]),
            ("setAge", 1) => Some(vec![ValueType::Int]),
            ("rename", 2) => Some(vec![ValueType::Str, ValueType::Str]),
            _ => None,
        }
    }

    fn invoke(&mut self, method: &str, mut args: Vec<Value>) -> Result<Value, InvokeError> {
        match (method, args.len()) {
            ("setName", 1) => self.set_property("name", args.remove(0))?,
            ("setAge", 1) => self.set_property("age", args.remove(0))?,
            ("rename", 2) => {
                let last = args.remove(1).into_string()?;
                let first = args.remove(0).into_string()?;
                self.name = format!("{first} {last}");
            }
            ("getName", 0) => return Ok(Value::from(self.name.as_str())),
            (method, arity) => {
                return Err(InvokeError::NoSuchMethod { type_name: "Person".into(), method: method.into(), arity });
            }
        }
        Ok(Value::Null)
    }
}

/// Holds people added through `addPerson`.
#[derive(Debug, Default)]
pub(crate) struct Directory {
    pub(crate) people: Vec<Object>,
    pub(crate) owner: Option<Object>,
}

impl Bean for Directory {
    fn type_name(&self) -> &str {
        "Directory"
    }

    fn invoke(&mut self, method: &str, mut args: Vec<Value>) -> Result<Value, InvokeError> {
        match (method, args.pop()) {
            ("addPerson", Some(Value::Object(person))) if args.is_empty() => self.people.push(person),
            ("setOwner", Some(Value::Object(owner))) if args.is_empty() => self.owner = Some(owner),
            (method, last) => {
                let arity = args.len() + usize::from(last.is_some());
                return Err(InvokeError::NoSuchMethod { type_name: "Directory".into(), method: method.into(), arity });
            }
        }
        Ok(Value::Null)
    }
}

impl Directory {
    pub(crate) fn names(&self) -> Vec<String> {
        self.people.iter().filter_map(|p| p.with::<Person, _>(|p| p.name.clone())).collect()
    }
}

/// `item` is a list property: each assignment appends.
#[derive(Debug, Default)]
pub(crate) struct Basket {
    pub(crate) items: Vec<String>,
    pub(crate) label: String,
}

impl Bean for Basket {
    fn type_name(&self) -> &str {
        "Basket"
    }

    fn property_type(&self, name: &str) -> Option<ValueType> {
        matches!(name, "item" | "label").then_some(ValueType::Str)
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), InvokeError> {
        let text = value.into_string()?;
        match name {
            "item" => self.items.push(text),
            "label" => self.label = text,
            other => return Err(self.no_such_property(other)),
        }
        Ok(())
    }
}

/// Receives its parent through `setParent`; `touch()` counts calls.
#[derive(Debug, Default)]
pub(crate) struct Child {
    pub(crate) parent: Option<Object>,
    pub(crate) touched: usize,
}

impl Bean for Child {
    fn type_name(&self) -> &str {
        "Child"
    }

    fn invoke(&mut self, method: &str, mut args: Vec<Value>) -> Result<Value, InvokeError> {
        match (method, args.pop()) {
            ("setParent", Some(Value::Object(parent))) => self.parent = Some(parent),
            ("touch", None) => self.touched += 1,
            (method, last) => {
                let arity = args.len() + usize::from(last.is_some());
                return Err(InvokeError::NoSuchMethod { type_name: "Child".into(), method: method.into(), arity });
            }
        }
        Ok(Value::Null)
    }
}
