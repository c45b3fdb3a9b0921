use std::collections::HashMap;
use std::fmt::Display;
use std::ops::{Add, Div, Mul, Sub};
use std::rc::Rc;

use crate::interpreter::RuntimeError;
use crate::program::Statement;

/// A runtime value. Values are immutable once produced; assignment replaces
/// a binding, it never mutates a shared value, which is why the compound
/// variants sit behind an Rc.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<String>),
    Array(Rc<Vec<Value>>),
    Object(Rc<HashMap<String, Value>>),
    /// A statement in a value position; evaluated rather than taken literally.
    Statement(Rc<Statement>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Rc::new(s.to_string()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Statement(statement) => write!(f, "<{}>", statement.operation),
        }
    }
}

// Starting here are convenience implementations to make the builtin table easier
impl Add for Value {
    type Output = Result<Value, RuntimeError>;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), Value::String(r)) => {
                let mut new = l.as_ref().to_owned();
                new.push_str(&r);
                Ok(Value::String(Rc::new(new)))
            }
            (Value::Array(l), Value::Array(r)) => {
                let mut new = l.as_ref().to_owned();
                new.extend(r.iter().cloned());
                Ok(Value::Array(Rc::new(new)))
            }
            _ => Err(RuntimeError::TypeError(
                "add expects two numbers, two strings, or two arrays",
            )),
        }
    }
}

impl Sub for Value {
    type Output = Result<Value, RuntimeError>;

    fn sub(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l - r)),
            _ => Err(RuntimeError::TypeError("subtract expects two numbers")),
        }
    }
}

impl Mul for Value {
    type Output = Result<Value, RuntimeError>;

    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l * r)),
            _ => Err(RuntimeError::TypeError("multiply expects two numbers")),
        }
    }
}

impl Div for Value {
    type Output = Result<Value, RuntimeError>;

    fn div(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(l), Value::Number(r)) => {
                if r == 0f64 {
                    Err(RuntimeError::DivideByZero)
                } else {
                    Ok(Value::Number(l / r))
                }
            }
            _ => Err(RuntimeError::TypeError("divide expects two numbers")),
        }
    }
}
