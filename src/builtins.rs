use crate::Value;
use std::rc::Rc;

pub type BuiltinFunction = fn(&[Value]) -> Option<Value>;

pub struct Builtin {
    pub name: &'static str,
    pub function: BuiltinFunction,
}

/// Registered in order; a builtin's position is its symbol index.
pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "println",
        function: println,
    },
    Builtin {
        name: "len",
        function: len,
    },
    Builtin {
        name: "str",
        function: str,
    },
    Builtin {
        name: "int",
        function: int,
    },
    Builtin {
        name: "float",
        function: float,
    },
    Builtin {
        name: "push",
        function: push,
    },
    Builtin {
        name: "remove",
        function: remove,
    },
];

fn error(message: String) -> Option<Value> {
    Some(Value::Error(message))
}

fn wrong_argument_count(got: usize, want: usize) -> Option<Value> {
    error(format!("wrong number of arguments. got={}, want={}", got, want))
}

fn println(arguments: &[Value]) -> Option<Value> {
    let line = arguments.iter().map(Value::to_string).collect::<String>();
    println!("{}", line);
    None
}

fn len(arguments: &[Value]) -> Option<Value> {
    match arguments {
        [Value::String(value)] => Some(Value::Integer(value.len() as i64)),
        [Value::Array(elements)] => Some(Value::Integer(elements.len() as i64)),
        [other] => error(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        )),
        _ => wrong_argument_count(arguments.len(), 1),
    }
}

fn str(arguments: &[Value]) -> Option<Value> {
    let result = arguments.iter().map(Value::to_string).collect::<String>();
    Some(Value::String(Rc::from(result)))
}

fn int(arguments: &[Value]) -> Option<Value> {
    match arguments {
        [Value::String(value)] => match value.parse::<i64>() {
            Ok(result) => Some(Value::Integer(result)),
            Err(_) => error(format!("Could not parse '{}' to a int", value)),
        },
        [other] => error(format!(
            "argument to `int` not supported, got {}",
            other.type_name()
        )),
        _ => wrong_argument_count(arguments.len(), 1),
    }
}

fn float(arguments: &[Value]) -> Option<Value> {
    match arguments {
        [Value::String(value)] => match value.parse::<f64>() {
            Ok(result) => Some(Value::Float(result)),
            Err(_) => error(format!("Could not parse '{}' to a float", value)),
        },
        [other] => error(format!(
            "argument to `float` not supported, got {}",
            other.type_name()
        )),
        _ => wrong_argument_count(arguments.len(), 1),
    }
}

fn push(arguments: &[Value]) -> Option<Value> {
    match arguments {
        [Value::Array(elements), value] => {
            let mut elements = elements.as_ref().clone();
            elements.push(value.clone());
            Some(Value::from(elements))
        }
        [other, _] => error(format!(
            "argument to `push` must be ARRAY, got {}",
            other.type_name()
        )),
        _ => wrong_argument_count(arguments.len(), 2),
    }
}

fn remove(arguments: &[Value]) -> Option<Value> {
    match arguments {
        [Value::Array(elements), Value::Integer(index)] => {
            if *index < 0 || *index as usize >= elements.len() {
                return error(format!(
                    "index {} out of range for array of length {}",
                    index,
                    elements.len()
                ));
            }
            let mut elements = elements.as_ref().clone();
            elements.remove(*index as usize);
            Some(Value::from(elements))
        }
        [Value::Array(_), other] => error(format!(
            "index must be a INTEGER, got {}",
            other.type_name()
        )),
        [other, _] => error(format!(
            "argument to `remove` must be ARRAY, got {}",
            other.type_name()
        )),
        _ => wrong_argument_count(arguments.len(), 2),
    }
}
