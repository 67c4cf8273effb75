//! tinylisp - a minimal embeddable Lisp
//!
//! This crate provides a tokenizer, an S-expression parser and a tree-walking
//! evaluator for a tiny Lisp-family language, intended for hosting small
//! expression or rule programs inside a larger application.
//!
//! ```text
//! (+ 1 2 3)                                ; 6
//! (let ((x 2) (y 3)) (+ x y))              ; 5
//! (if "" "yes" "no")                       ; "no"
//! ((lambda (a b) (* a b)) 6 7)             ; 42
//! (rest (1 2 3))                           ; (2 3)
//! ```
//!
//! ## Language
//!
//! - Atoms are numbers (double precision floats), double-quoted strings, or
//!   identifiers. Any other bareword is an identifier.
//! - There are three special forms: `let`, `if` and `lambda`.
//! - A list whose first evaluated element is callable is an application;
//!   any other list evaluates to the sequence of its evaluated elements.
//! - Identifiers that are not bound evaluate to [`Value::Unbound`](value::Value::Unbound)
//!   rather than raising an error. `Unbound`, `0`, `""` and the empty
//!   sequence are falsy.
//! - Closures capture their defining [`Context`](evaluator::Context) by
//!   reference, so a `lambda` bound inside a `let` can call itself and any
//!   binding made later in the same `let`.
//!
//! ## Modules
//!
//! - `reader`: tokenization and S-expression parsing from text
//! - `ast`: the parsed tree
//! - `value`: runtime values
//! - `evaluator`: environments and evaluation
//! - `builtinops`: special forms and primitive functions

use std::fmt;

/// Maximum parsing depth to prevent stack overflow on deeply nested input
pub const MAX_PARSE_DEPTH: usize = 256;

/// Maximum number of closure calls active at once. Runaway recursion fails
/// with an `EvalError` when it reaches this depth; the stack grows as needed
/// below it.
pub const MAX_EVAL_DEPTH: usize = 4096;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// The token sequence ran out before a list was closed (or was empty)
    UnexpectedEndOfInput,
    /// A string literal was opened but never closed
    UnterminatedString,
    /// A token appeared where it cannot start a datum (a stray `)`)
    UnexpectedToken,
    /// A token that cannot be classified (empty)
    MalformedToken,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError naming the token that caused it
    pub fn with_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::new(kind, message, None, Some(found.into()))
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = input
            .get(..error_offset)
            .map_or(0, |before| before.chars().count().saturating_sub(20));

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        // Keep the snippet on one line
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), None)
    }
}

/// Error types for the interpreter
///
/// Every error is fatal: evaluation stops at the first one and it is
/// returned to the host unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    TypeError {
        message: String,
        expression: Option<String>,
    },
    /// Counts are operands: the elements of a form after its head, or the
    /// arguments of a call. `(if 1 2)` reports `expected: 3, got: 2`.
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
}

impl Error {
    /// Create a TypeError without expression context
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::TypeError {
            message: message.into(),
            expression: None,
        }
    }

    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// Attach the offending expression unless a more specific one is already recorded
    #[must_use]
    pub(crate) fn with_expression(self, expr: impl FnOnce() -> String) -> Self {
        match self {
            Error::TypeError {
                message,
                expression: None,
            } => Error::TypeError {
                message,
                expression: Some(expr()),
            },
            Error::ArityError {
                expected,
                got,
                expression: None,
            } => Error::ArityError {
                expected,
                got,
                expression: Some(expr()),
            },
            other => other,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError {
                message,
                expression,
            } => {
                write!(f, "TypeError: {message}")?;
                if let Some(expr) = expression {
                    write!(f, "\n  while evaluating: {expr}")?;
                }
                Ok(())
            }
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: expression {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: function expected {expected} arguments but got {got}"
                ),
            },
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
mod stack;
pub mod value;

#[cfg(feature = "reader")]
pub mod reader;

/// Parse the first top-level form of `source` and evaluate it in a fresh
/// default root context.
#[cfg(feature = "reader")]
pub fn evaluate_str(source: &str) -> Result<value::Value, Error> {
    let node = reader::parse_str(source)?;
    evaluator::interpret(&node, None)
}
