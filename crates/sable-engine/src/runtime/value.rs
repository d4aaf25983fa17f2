//! Runtime values of the reference evaluator
//!
//! The target model is deliberately small: primitives, mutable heap objects
//! carrying an optional runtime type, closures, and host functions. Objects
//! get their identity from a per-interpreter counter, so two runs of the same
//! program see the same identities.

use crate::compiler::ir::LStmt;
use crate::syntax::TypeId;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub type ObjectRef = Rc<RefCell<Object>>;

/// A heap object
#[derive(Debug, Default)]
pub struct Object {
    /// Identity assigned at allocation
    pub id: u64,
    /// Runtime type for catch dispatch; `None` for plain objects
    pub class: Option<TypeId>,
    pub fields: FxHashMap<String, Value>,
}

/// Variables of one function activation
#[derive(Debug, Default)]
pub struct Scope {
    pub(crate) vars: FxHashMap<String, Value>,
    pub(crate) parent: Option<Env>,
}

pub type Env = Rc<RefCell<Scope>>;

/// A function value: lowered body plus captured environment
pub struct Closure {
    pub name: String,
    pub params: Vec<String>,
    pub body: Arc<[LStmt]>,
    /// `None` for top-level functions
    pub env: Option<Env>,
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObjectRef),
    Function(Rc<Closure>),
    /// Function provided by the embedding, looked up by name at call time
    Host(Rc<str>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    /// JavaScript truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) | Value::Host(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Object identity, for objects
    pub fn identity(&self) -> Option<u64> {
        self.as_object().map(|o| o.borrow().id)
    }

    pub fn class(&self) -> Option<TypeId> {
        self.as_object().and_then(|o| o.borrow().class)
    }

    /// Field of an object; `Undefined` for anything else or a missing field
    pub fn field(&self, name: &str) -> Value {
        self.as_object()
            .and_then(|o| o.borrow().fields.get(name).cloned())
            .unwrap_or(Value::Undefined)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) | Value::Host(_) => "function",
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::Str(s) => write!(f, "{}", s),
            Value::Object(o) => {
                let o = o.borrow();
                match o.fields.get("message") {
                    Some(Value::Str(message)) => write!(f, "[object #{}: {}]", o.id, message),
                    _ => write!(f, "[object #{}]", o.id),
                }
            }
            Value::Function(c) => write!(f, "[function {}]", c.name),
            Value::Host(name) => write!(f, "[host {}]", name),
        }
    }
}

// Shallow on purpose: object graphs may be cyclic
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(o) => {
                let o = o.borrow();
                match o.class {
                    Some(class) => write!(f, "Object#{}({})", o.id, class),
                    None => write!(f, "Object#{}", o.id),
                }
            }
            other => write!(f, "{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(Value::from(2).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = Value::Object(Rc::new(RefCell::new(Object {
            id: 1,
            ..Object::default()
        })));
        let b = Value::Object(Rc::new(RefCell::new(Object {
            id: 1,
            ..Object::default()
        })));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_number_display() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
    }
}
