//! Runtime values produced by evaluation.
//!
//! [`Value`] is a closed sum type; the evaluator and the builtins match on it
//! exhaustively instead of inspecting types ad hoc. Conversion traits cover
//! the common Rust types so that hosts and tests can build values with
//! `.into()`.

use crate::Error;
use crate::ast::Node;
use crate::evaluator::Context;
use crate::evaluator::intooperation::OperationFn;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A user-defined function: formal parameter names, the body form shared
/// with the parsed tree, and the context the `lambda` was evaluated in.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Node,
    pub env: Context,
}

// The captured context can contain this closure, so it is left out.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body.to_string())
            .finish_non_exhaustive()
    }
}

/// Result of evaluating any node
#[derive(Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    /// List data, and the result of any list form that is not an application
    Sequence(Vec<Value>),
    /// Closure created by `lambda`
    Function(Rc<Closure>),
    /// Primitive implemented in Rust
    /// Uses id string for equality comparison instead of function pointer
    BuiltinFunction { id: String, func: Arc<OperationFn> },
    /// Value of an identifier with no binding in scope
    Unbound,
}

impl Value {
    /// Condition test used by `if`: the number 0, the empty string, the
    /// empty sequence and `Unbound` are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Sequence(items) => !items.is_empty(),
            Value::Function(_) | Value::BuiltinFunction { .. } => true,
            Value::Unbound => false,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::BuiltinFunction { .. })
    }

    /// Name of the value kind, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Function(_) => "function",
            Value::BuiltinFunction { .. } => "builtin",
            Value::Unbound => "unbound",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text(\"{s}\")"),
            Value::Sequence(items) => {
                write!(f, "Sequence(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Function(closure) => write!(f, "{closure:?}"),
            Value::BuiltinFunction { id, .. } => write!(f, "BuiltinFunction({id})"),
            Value::Unbound => write!(f, "Unbound"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "\"{s}\""),
            Value::Sequence(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Function(_) => write!(f, "#<lambda>"),
            Value::BuiltinFunction { id, .. } => write!(f, "#<builtin:{id}>"),
            Value::Unbound => write!(f, "nil"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltinFunction { id: id1, .. }, Value::BuiltinFunction { id: id2, .. }) => {
                id1 == id2
            }
            (Value::Unbound, Value::Unbound) => true,
            _ => false,
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(f64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

/// Comparison results: 1 for true, 0 for false
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::Sequence(arr.into_iter().map(Into::into).collect())
    }
}

/// Numeric view of a value. `Unbound` reads as 0.
impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<f64, Error> {
        match value {
            Value::Number(n) => Ok(n),
            Value::Unbound => Ok(0.0),
            other => Err(Error::type_error(format!(
                "expected number, found {}",
                other.type_name()
            ))),
        }
    }
}

/// Helper function for creating Values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty sequences
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Sequence(vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        let test_cases = vec![
            (val(0), false),
            (val(-0.0), false),
            (val(1), true),
            (val(-3.5), true),
            (val(""), false),
            (val("0"), true),
            (nil(), false),
            (val([0]), true),
            (Value::Unbound, false),
            (val(vec![Value::Unbound]), true),
        ];

        for (i, (value, expected)) in test_cases.iter().enumerate() {
            assert_eq!(
                value.is_truthy(),
                *expected,
                "Truthiness case #{}: {value:?}",
                i + 1
            );
        }
    }

    #[test]
    fn test_display() {
        let test_cases = vec![
            (val(6), "6"),
            (val(2.5), "2.5"),
            (val("hello lisp"), "\"hello lisp\""),
            (val([1, 2, 3]), "(1 2 3)"),
            (val(vec![val(2889), Value::Unbound, val(455)]), "(2889 nil 455)"),
            (nil(), "()"),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.to_string(), expected);
        }
    }

    #[test]
    fn test_equality() {
        assert_eq!(val([1, 2]), val(vec![val(1.0), val(2.0)]));
        assert_eq!(Value::Unbound, Value::Unbound);
        assert_ne!(val(0), Value::Unbound);
        assert_ne!(val("1"), val(1));
        assert_ne!(nil(), val(""));
        assert_eq!(val(true), val(1));
        assert_eq!(val(false), val(0));
    }

    #[test]
    fn test_numeric_conversion() {
        assert_eq!(f64::try_from(val(4)), Ok(4.0));
        assert_eq!(f64::try_from(Value::Unbound), Ok(0.0));
        assert!(matches!(
            f64::try_from(val("4")),
            Err(Error::TypeError { .. })
        ));
    }
}
