use crate::{flatten, Instructions, RuntimeError, TypeName};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    rc::Rc,
};

#[derive(Debug, Clone, Default)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<BTreeMap<HashKey, Value>>),
    Function(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(usize),
    Error(String),
    #[default]
    Void,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Boolean(_) => "BOOLEAN",
            Value::String(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
            Value::Error(_) => "ERROR",
            Value::Void => "VOID",
        }
    }

    /// Numeric view shared by integers and floats.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn hash_key(&self) -> Result<HashKey, RuntimeError> {
        match self {
            Value::Integer(value) => Ok(HashKey::Integer(*value)),
            Value::Boolean(value) => Ok(HashKey::Boolean(*value)),
            Value::String(value) => Ok(HashKey::String(value.clone())),
            _ => Err(RuntimeError::UnusableHashKey(self.type_name())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(left), Value::Integer(right)) => left == right,
            (Value::Float(left), Value::Float(right)) => left == right,
            (Value::Boolean(left), Value::Boolean(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Array(left), Value::Array(right)) => Rc::ptr_eq(left, right),
            (Value::Hash(left), Value::Hash(right)) => Rc::ptr_eq(left, right),
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::Closure(left), Value::Closure(right)) => Rc::ptr_eq(left, right),
            (Value::Builtin(left), Value::Builtin(right)) => left == right,
            (Value::Error(left), Value::Error(right)) => left == right,
            (Value::Void, Value::Void) => true,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "{}", value),
            Value::Array(elements) => write!(f, "[{}]", flatten(elements.as_slice(), ", ")),
            Value::Hash(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Value::Function(function) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(function)),
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Value::Builtin(_) => write!(f, "builtin function"),
            Value::Error(message) => write!(f, "ERROR: {}", message),
            Value::Void => write!(f, "void"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(elements))
    }
}

/// The subset of values usable as hash keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashKey {
    Boolean(bool),
    Integer(i64),
    String(Rc<str>),
}

impl Display for HashKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            HashKey::Boolean(value) => write!(f, "{}", value),
            HashKey::Integer(value) => write!(f, "{}", value),
            HashKey::String(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
    pub parameter_types: Vec<TypeName>,
}

/// A compiled function paired with the values it captured when created.
#[derive(Debug, Default)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: RefCell<Vec<Value>>,
}

impl Closure {
    pub fn new(function: Rc<CompiledFunction>, free: Vec<Value>) -> Self {
        Self {
            function,
            free: RefCell::new(free),
        }
    }
}

impl TypeName {
    /// Whether a runtime value is acceptable where this type is declared.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TypeName::Int => matches!(value, Value::Integer(_)),
            TypeName::Float => matches!(value, Value::Float(_)),
            TypeName::Bool => matches!(value, Value::Boolean(_)),
            TypeName::Str => matches!(value, Value::String(_)),
            TypeName::Map => matches!(value, Value::Hash(_)),
            TypeName::Array => matches!(value, Value::Array(_)),
            TypeName::Fn => matches!(
                value,
                Value::Function(_) | Value::Closure(_) | Value::Builtin(_)
            ),
            TypeName::Void => matches!(value, Value::Void),
        }
    }
}
