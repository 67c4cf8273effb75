use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::{EndNode, Node};
use crate::builtinops::{OpKind, find_special_form, get_builtin_ops};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Closure, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub mod intooperation;

use intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};

/// Expected argument count of a special form or builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub(crate) fn validate(self, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(expected) if got != expected => Err(Error::arity_error(expected, got)),
            Arity::AtLeast(min) if got < min => Err(Error::arity_error(min, got)),
            _ => Ok(()),
        }
    }
}

struct Scope {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Context>,
}

/// Lexical scope: bindings plus an optional enclosing scope.
///
/// Cloning a `Context` shares it. A closure keeps its defining context alive
/// and sees bindings added to it after the closure was created, which is
/// what lets `let` bind self- and mutually recursive functions.
#[derive(Clone)]
pub struct Context(Rc<Scope>);

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// An empty root context, without the primitive library.
    /// See [`default_root_context`] for the usual starting point.
    pub fn new() -> Self {
        Context(Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// An empty context nested inside `parent`
    pub fn with_parent(parent: &Context) -> Self {
        Context(Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&Context> {
        self.0.parent.as_ref()
    }

    /// Bind `name` in this context, replacing any existing binding here
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Find the innermost binding of `name` along the parent chain
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some(value) = ctx.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            current = ctx.parent();
        }
        None
    }

    /// Like [`Context::lookup`], but a missing binding is [`Value::Unbound`]
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name).unwrap_or(Value::Unbound)
    }

    /// True when both handles refer to the same scope
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register a builtin that works directly on the argument slice.
    ///
    /// # Example
    /// ```
    /// use tinylisp::evaluator::default_root_context;
    /// use tinylisp::value::Value;
    /// use tinylisp::Error;
    ///
    /// fn count(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::Number(args.len() as f64))
    /// }
    ///
    /// let ctx = default_root_context();
    /// ctx.register_builtin_function("count", count);
    /// ```
    pub fn register_builtin_function(&self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.define_builtin(name, wrapped);
    }

    /// Register a strongly-typed Rust function as a builtin.
    ///
    /// ```
    /// use tinylisp::evaluator::default_root_context;
    ///
    /// fn hypot(a: f64, b: f64) -> f64 {
    ///     a.hypot(b)
    /// }
    ///
    /// let ctx = default_root_context();
    /// ctx.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// ```
    ///
    /// Supported parameter types: `f64` (`Unbound` reads as 0), `&str`,
    /// `Value`, and the sequence views `ValueIter<'_>` and `NumIter<'_>`.
    /// Return any `R: Into<Value>` or `Result<R, Error>`.
    ///
    /// Arity is enforced automatically (`ArityError`); a conversion failure
    /// is a `TypeError`.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        self.define_builtin(name, func.into_operation());
    }

    /// Register a builtin whose last parameter collects the remaining
    /// arguments (`ValueIter<'_>` or `NumIter<'_>`), checking the total
    /// argument count against `arity` first.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args>,
    {
        let inner = func.into_variadic_operation();
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });
        self.define_builtin(name, wrapped);
    }

    fn define_builtin(&self, name: &str, func: Arc<OperationFn>) {
        self.define(
            name,
            Value::BuiltinFunction {
                id: name.to_owned(),
                func,
            },
        );
    }

    /// All bindings visible from this context, inner bindings shadowing
    /// outer ones, sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();
        let mut current = Some(self);
        while let Some(ctx) = current {
            for (name, value) in ctx.0.bindings.borrow().iter() {
                bindings
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            current = ctx.parent();
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

// Scopes can contain closures that point back at them, so only names are shown.
impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.0.bindings.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Context")
            .field("bindings", &names)
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Evaluation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Closure calls that may be active at once before evaluation fails
    /// with an `EvalError`
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// Number of active closure calls, threaded through evaluation and handed
/// to special forms. Form nesting is bounded by the parser and does not
/// count.
#[derive(Debug, Clone, Copy)]
pub struct Depth {
    current: usize,
    limit: usize,
}

impl Depth {
    fn root(config: &EvalConfig) -> Self {
        Depth {
            current: 0,
            limit: config.max_depth,
        }
    }

    fn next(self) -> Self {
        Depth {
            current: self.current + 1,
            ..self
        }
    }
}

/// Evaluate `node` in `context`, or in a fresh [`default_root_context`]
/// when none is given.
pub fn interpret(node: &Node, context: Option<&Context>) -> Result<Value, Error> {
    interpret_with_config(node, context, &EvalConfig::default())
}

/// [`interpret`] with explicit limits
pub fn interpret_with_config(
    node: &Node,
    context: Option<&Context>,
    config: &EvalConfig,
) -> Result<Value, Error> {
    match context {
        Some(ctx) => eval_with_depth_tracking(node, ctx, Depth::root(config)),
        None => eval_with_depth_tracking(node, &default_root_context(), Depth::root(config)),
    }
}

/// Evaluate `node` in `context` with the default limits
pub fn eval(node: &Node, context: &Context) -> Result<Value, Error> {
    eval_with_depth_tracking(node, context, Depth::root(&EvalConfig::default()))
}

pub(crate) fn eval_with_depth_tracking(
    node: &Node,
    env: &Context,
    depth: Depth,
) -> Result<Value, Error> {
    match node {
        Node::End(EndNode::Number(n)) => Ok(Value::Number(*n)),
        Node::End(EndNode::String(s)) => Ok(Value::Text(s.clone())),
        // Unbound identifiers are a value, not an error
        Node::End(EndNode::Identifier(name)) => Ok(env.get(name)),
        Node::List(elements) => ensure_sufficient_stack(|| eval_list(elements, env, depth))
            .map_err(|err| err.with_expression(|| node.to_string())),
    }
}

/// Special form, application, or plain data
fn eval_list(elements: &[Node], env: &Context, depth: Depth) -> Result<Value, Error> {
    if let [Node::End(EndNode::Identifier(keyword)), args @ ..] = elements
        && let Some(form) = find_special_form(keyword)
        && let OpKind::SpecialForm(special_form) = form.op_kind
    {
        form.validate_arity(args.len())?;
        return special_form(args, env, depth);
    }

    let mut values = elements
        .iter()
        .map(|element| eval_with_depth_tracking(element, env, depth))
        .collect::<Result<Vec<_>, _>>()?;

    if values.first().is_some_and(Value::is_callable) {
        let args = values.split_off(1);
        let callee = values.swap_remove(0);
        apply(&callee, args, depth)
    } else {
        Ok(Value::Sequence(values))
    }
}

/// Call a function value with already evaluated arguments
pub(crate) fn apply(callee: &Value, args: Vec<Value>, depth: Depth) -> Result<Value, Error> {
    match callee {
        Value::BuiltinFunction { func, .. } => func(args),
        Value::Function(closure) => invoke_closure(closure, args, depth),
        other => Err(Error::type_error(format!(
            "cannot apply {}",
            other.type_name()
        ))),
    }
}

/// Bind parameters in a fresh scope under the captured context and evaluate
/// the body there. Missing arguments are `Unbound`; extra ones are dropped.
fn invoke_closure(closure: &Closure, args: Vec<Value>, depth: Depth) -> Result<Value, Error> {
    if depth.current >= depth.limit {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {})",
            depth.limit
        )));
    }

    tracing::trace!(
        params = closure.params.len(),
        args = args.len(),
        "invoking closure"
    );
    if args.len() > closure.params.len() {
        tracing::trace!(
            ignored = args.len() - closure.params.len(),
            "dropping surplus closure arguments"
        );
    }

    let call_env = Context::with_parent(&closure.env);
    let mut args = args.into_iter();
    for param in &closure.params {
        call_env.define(param.clone(), args.next().unwrap_or(Value::Unbound));
    }

    eval_with_depth_tracking(&closure.body, &call_env, depth.next())
}

/// `(let ((name expr) ...) body)`
///
/// Each binding is evaluated in the new scope and written to it before the
/// next one is evaluated, so closures bound here can refer to any name of
/// the same `let` once the body runs.
pub(crate) fn eval_let(args: &[Node], env: &Context, depth: Depth) -> Result<Value, Error> {
    match args {
        [bindings, body] => {
            let Some(bindings) = bindings.as_list() else {
                return Err(Error::type_error(format!(
                    "let bindings must be a list, found {} {bindings}",
                    bindings.type_name()
                )));
            };

            let scope = Context::with_parent(env);
            for binding in bindings {
                match binding.as_list() {
                    Some([Node::End(EndNode::Identifier(name)), value_expr]) => {
                        let value = eval_with_depth_tracking(value_expr, &scope, depth)?;
                        scope.define(name.clone(), value);
                    }
                    Some([name, _]) => {
                        return Err(Error::type_error(format!(
                            "let binding name must be an identifier, found {} {name}",
                            name.type_name()
                        )));
                    }
                    _ => {
                        return Err(Error::type_error(format!(
                            "let binding must be a (name value) pair, found {binding}"
                        )));
                    }
                }
            }

            eval_with_depth_tracking(body, &scope, depth)
        }
        _ => Err(Error::arity_error(2, args.len())),
    }
}

/// `(if condition then else)`
pub(crate) fn eval_if(args: &[Node], env: &Context, depth: Depth) -> Result<Value, Error> {
    match args {
        [condition_expr, then_expr, else_expr] => {
            let condition = eval_with_depth_tracking(condition_expr, env, depth)?;
            if condition.is_truthy() {
                eval_with_depth_tracking(then_expr, env, depth)
            } else {
                eval_with_depth_tracking(else_expr, env, depth)
            }
        }
        _ => Err(Error::arity_error(3, args.len())),
    }
}

/// `(lambda (param ...) body)`
pub(crate) fn eval_lambda(args: &[Node], env: &Context, _depth: Depth) -> Result<Value, Error> {
    match args {
        [Node::List(param_list), body] => {
            let mut params: Vec<String> = Vec::with_capacity(param_list.len());
            for param in param_list.iter() {
                match param.as_identifier() {
                    Some(name) if params.iter().any(|p| p == name) => {
                        return Err(Error::type_error(format!(
                            "duplicate lambda parameter: {name}"
                        )));
                    }
                    Some(name) => params.push(name.to_owned()),
                    None => {
                        return Err(Error::type_error(format!(
                            "lambda parameters must be identifiers, found {} {param}",
                            param.type_name()
                        )));
                    }
                }
            }

            Ok(Value::Function(Rc::new(Closure {
                params,
                body: body.clone(),
                env: env.clone(),
            })))
        }
        [params, _] => Err(Error::type_error(format!(
            "lambda parameters must be a list, found {} {params}",
            params.type_name()
        ))),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

/// A root context holding the primitive library
pub fn default_root_context() -> Context {
    let env = Context::new();

    for builtin_op in get_builtin_ops() {
        if let OpKind::Function(func) = &builtin_op.op_kind {
            env.define_builtin(builtin_op.id, Arc::clone(func));
        }
    }

    env
}

/// A root context whose `print` passes its arguments to `sink` instead of
/// the log
pub fn root_context_with_print_sink<S>(sink: S) -> Context
where
    S: Fn(&[Value]) + Send + Sync + 'static,
{
    let env = default_root_context();
    let print: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| -> Result<Value, Error> {
        sink(args.as_slice());
        Ok(Value::Sequence(args))
    });
    env.define_builtin("print", print);
    env
}
