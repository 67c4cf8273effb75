//! Built-in operations registry.
//!
//! Every name the language predefines lives in one table: the three special
//! forms and the primitive functions installed into a default root context.
//!
//! ```text
//! (let ((x 1)) x)      ; special form
//! (if (< 1 2) 3 4)     ; special form
//! (lambda (x) x)       ; special form
//! (+ 1 2 3)            ; function
//! (rest (1 2 3))       ; function
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: receive their arguments already evaluated. They are
//!   ordinary values bound in the root context, so a program can shadow
//!   them, pass them around, or compute them (`((if c + -) 1 2)`).
//! - **Special Forms**: receive their operands unevaluated together with the
//!   current context. They are recognized by keyword at the head of a list
//!   before anything is evaluated, so a binding named `if` never hides the
//!   form.
//!
//! ## Coercions
//!
//! Numeric parameters accept `Unbound` as 0, matching the rule that unbound
//! identifiers are values rather than errors. Any other non-number is a
//! `TypeError`. Comparisons return the numbers 1 and 0.
//!
//! ## Adding New Operations
//!
//! 1. Write the function with typed parameters (`f64`, `&str`, `Value`,
//!    `ValueIter`, `NumIter`)
//! 2. Add it to `BUILTIN_OPS` with its identifier and arity
//! 3. Add cases to the data-driven tests below

use crate::Error;
use crate::ast::Node;
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, NumIter, OperationFn, ValueIter,
};
use crate::evaluator::{Arity, Context, Depth, eval_if, eval_lambda, eval_let};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Signature shared by the special forms: unevaluated operands, the current
/// context and the current evaluation depth
pub type SpecialFormFn = fn(&[Node], &Context, Depth) -> Result<Value, Error>;

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Regular function that takes evaluated arguments and returns a value
    /// via the canonical erased builtin signature used by the evaluator.
    Function(Arc<OperationFn>),
    /// Special form that controls the evaluation of its operands
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The identifier this operation is bound to
    pub id: &'static str,
    /// The implementation of this operation (function or special form)
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    /// Check if this operation is a special form
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check if the given number of arguments is valid for this operation
    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(arg_count)
    }
}

//
// Builtin Function Implementations
//

// Macro to generate numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(a: f64, b: f64) -> bool {
            a $op b
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

#[expect(clippy::float_cmp)] // `=` is exact
fn builtin_eq(a: f64, b: f64) -> bool {
    a == b
}

fn builtin_add(args: NumIter<'_>) -> f64 {
    args.sum()
}

fn builtin_sub(a: f64, b: f64) -> f64 {
    a - b
}

fn builtin_mul(a: f64, b: f64) -> f64 {
    a * b
}

/// Always a float. Division by zero follows IEEE 754: `inf`, `-inf`, or
/// NaN for `(/ 0 0)`.
fn builtin_div(a: f64, b: f64) -> f64 {
    a / b
}

/// Head of a sequence; `Unbound` when it is empty
fn builtin_first(mut list: ValueIter<'_>) -> Value {
    list.next().cloned().unwrap_or(Value::Unbound)
}

/// Sequence without its head; empty when there is no head
fn builtin_rest(list: ValueIter<'_>) -> Value {
    Value::Sequence(list.skip(1).cloned().collect())
}

/// Writes the arguments to the log and hands them back as a sequence.
/// Hosts that need the output capture it with
/// [`root_context_with_print_sink`](crate::evaluator::root_context_with_print_sink).
fn builtin_print(args: Vec<Value>) -> Value {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(target: "tinylisp::print", "{line}");
    Value::Sequence(args)
}

/// Global registry of all built-in operations.
///
/// The primitive implementations are wired through the same adapter layer
/// used for custom builtin registration, once, on first use.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    vec![
        // Special forms
        BuiltinOp {
            id: "let",
            op_kind: OpKind::SpecialForm(eval_let),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "if",
            op_kind: OpKind::SpecialForm(eval_if),
            arity: Arity::Exact(3),
        },
        BuiltinOp {
            id: "lambda",
            op_kind: OpKind::SpecialForm(eval_lambda),
            // Fixed parameter lists only; duplicate names are rejected
            arity: Arity::Exact(2),
        },
        // Sequence operations
        BuiltinOp {
            id: "first",
            op_kind: OpKind::Function(builtin_fixed::<(ValueIter<'static>,), _>(builtin_first)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "rest",
            op_kind: OpKind::Function(builtin_fixed::<(ValueIter<'static>,), _>(builtin_rest)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "print",
            op_kind: OpKind::Function(Arc::new(|args: Vec<Value>| -> Result<Value, Error> {
                Ok(builtin_print(args))
            })),
            arity: Arity::Any,
        },
        // Arithmetic operations
        BuiltinOp {
            id: "+",
            op_kind: OpKind::Function(builtin_variadic::<(NumIter<'static>,), _>(builtin_add)),
            arity: Arity::Any,
        },
        BuiltinOp {
            id: "-",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_sub)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "*",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_mul)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "/",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_div)),
            arity: Arity::Exact(2),
        },
        // Comparison operations
        BuiltinOp {
            id: "<",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_lt)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: ">",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_gt)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "=",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_eq)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<=",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_le)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: ">=",
            op_kind: OpKind::Function(builtin_fixed::<(f64, f64), _>(builtin_ge)),
            arity: Arity::Exact(2),
        },
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations (for internal use by evaluator)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Find a special form by keyword
pub(crate) fn find_special_form(keyword: &str) -> Option<&'static BuiltinOp> {
    find_builtin_op(keyword).filter(|op| op.is_special_form())
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::value::{nil, val};

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Invoke a builtin through the public registry using the canonical
    /// erased signature (Vec<Value> -> Result<Value, Error>).
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let Some(op) = find_builtin_op(name) else {
            panic!("builtin not found: {name}");
        };
        match &op.op_kind {
            OpKind::Function(func) => func(args.to_vec()),
            OpKind::SpecialForm(_) => {
                panic!("expected function builtin in tests, got special form: {name}")
            }
        }
    }

    #[test]
    fn test_builtin_ops_registry() {
        let add_op = find_builtin_op("+").unwrap();
        assert_eq!(add_op.arity, Arity::Any);
        assert!(!add_op.is_special_form());

        if let OpKind::Function(func) = &add_op.op_kind {
            let result = func(vec![val(1), val(2)]).unwrap();
            assert_eq!(result, val(3));
        } else {
            panic!("Expected Function variant");
        }

        for (keyword, arity) in [
            ("let", Arity::Exact(2)),
            ("if", Arity::Exact(3)),
            ("lambda", Arity::Exact(2)),
        ] {
            let op = find_special_form(keyword).unwrap();
            assert!(op.is_special_form(), "{keyword}");
            assert_eq!(op.arity, arity, "{keyword}");
        }

        // Functions are not special forms
        assert!(find_special_form("first").is_none());
        assert!(find_special_form("unknown").is_none());
        assert!(find_builtin_op("unknown").is_none());

        let ids: Vec<&str> = get_builtin_ops().iter().map(|op| op.id).collect();
        assert_eq!(ids.len(), 15);
        assert!(std::ptr::eq(
            find_builtin_op("rest").unwrap(),
            get_builtin_ops().iter().find(|op| op.id == "rest").unwrap()
        ));
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let many_ones: Vec<Value> = (0..100).map(|_| val(1)).collect();
        let mixed = val(vec![val(1), val("hello"), Value::Unbound, nil()]);

        let test_cases: Vec<TestCase> = vec![
            // =================================================================
            // ARITHMETIC
            // =================================================================
            test!("+", &[], success(0)),                       // Identity
            test!("+", &[val(5)], success(5)),                 // Single number
            test!("+", &[val(1), val(2), val(3)], success(6)), // Multiple numbers
            test!("+", &[val(-5), val(10)], success(5)),       // Negative numbers
            test!("+", &[val(0.5), val(0.25)], success(0.75)), // Fractions
            test!("+", &[Value::Unbound, val(2)], success(2)), // Unbound reads as 0
            test!("+", &many_ones, success(100)),
            test!("+", &[val("not a number")], None),
            test!("+", &[val(1), nil()], None),
            test!("-", &[val(10), val(4)], success(6)),
            test!("-", &[val(0), val(5)], success(-5)),
            test!("-", &[Value::Unbound, val(1)], success(-1)),
            test!("-", &[val(5)], None), // No unary minus
            test!("-", &[val(1), val(2), val(3)], None),
            test!("-", &[val(5), val("1")], None),
            test!("*", &[val(6), val(7)], success(42)),
            test!("*", &[val(-2), val(3)], success(-6)),
            test!("*", &[val(0), val(100)], success(0)),
            test!("*", &[], None),
            test!("*", &[val(2), nil()], None),
            test!("/", &[val(7), val(2)], success(3.5)),
            test!("/", &[val(-9), val(3)], success(-3)),
            test!("/", &[val(1), val(0)], success(f64::INFINITY)),
            test!("/", &[val(-1), Value::Unbound], success(f64::NEG_INFINITY)), // Unbound divisor is 0
            test!("/", &[val(1)], None),
            // =================================================================
            // COMPARISONS
            // =================================================================
            test!("<", &[val(2), val(9)], success(1)),
            test!("<", &[val(8), val(4)], success(0)),
            test!("<", &[val(6), val(6)], success(0)),
            test!(">", &[val(7), val(3)], success(1)),
            test!(">", &[val(4), val(4)], success(0)),
            test!(">", &[val(-1), val(-2)], success(1)),
            test!("=", &[val(12), val(12)], success(1)),
            test!("=", &[val(8), val(3)], success(0)),
            test!("=", &[val(0), Value::Unbound], success(1)),
            test!("<=", &[val(3), val(3)], success(1)),
            test!("<=", &[val(8), val(2)], success(0)),
            test!(">=", &[val(7), val(7)], success(1)),
            test!(">=", &[val(2), val(6)], success(0)),
            test!("<", &[val(1)], None),
            test!("<", &[val(1), val(2), val(3)], None),
            test!("=", &[val("a"), val("a")], None), // Numbers only
            // =================================================================
            // SEQUENCES
            // =================================================================
            test!("first", &[val([1, 2, 3])], success(1)),
            test!("first", &[val(["only"])], success("only")),
            test!("first", &[val(vec![val([1]), val(2)])], success([1])),
            test!("first", std::slice::from_ref(&mixed), success(1)),
            test!("first", &[nil()], Some(Value::Unbound)),
            test!("first", &[], None),
            test!("first", &[val(42)], None),
            test!("first", &[val("not a list")], None),
            test!("first", &[Value::Unbound], None),
            test!("first", &[val([1]), val([2])], None),
            test!("rest", &[val([1, 2, 3])], success([2, 3])),
            test!("rest", &[val(["only"])], Some(nil())),
            test!("rest", &[nil()], Some(nil())),
            test!(
                "rest",
                std::slice::from_ref(&mixed),
                success(vec![val("hello"), Value::Unbound, nil()])
            ),
            test!("rest", &[], None),
            test!("rest", &[val(true)], None),
            // =================================================================
            // PRINT
            // =================================================================
            test!("print", &[], Some(nil())),
            test!(
                "print",
                &[val(2889), Value::Unbound, val(455)],
                success(vec![val(2889), Value::Unbound, val(455)])
            ),
        ];

        for (test_expr, result, expected) in test_cases {
            match (result, expected) {
                (Ok(actual), Some(expected_val)) => {
                    assert_eq!(actual, expected_val, "Failed for test case: {test_expr}");
                }
                (Err(_), None) => {} // Expected error
                (actual, expected) => panic!(
                    "Unexpected result for test case: {test_expr}\nGot result: {actual:?}, Expected: {expected:?}"
                ),
            }
        }
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            call_builtin("/", &[val(0), val(0)]),
            Ok(Value::Number(n)) if n.is_nan()
        ));
        assert_eq!(
            call_builtin("-", &[val(1)]),
            Err(Error::arity_error(2, 1))
        );
        assert_eq!(
            call_builtin("first", &[val(1), val(2)]),
            Err(Error::arity_error(1, 2))
        );
        assert!(matches!(
            call_builtin("rest", &[val("abc")]),
            Err(Error::TypeError { .. })
        ));
        assert!(matches!(
            call_builtin("+", &[val(1), val("2")]),
            Err(Error::TypeError { .. })
        ));
    }
}
