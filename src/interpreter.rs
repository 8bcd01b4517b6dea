use core::fmt;
use std::{collections::{HashMap, HashSet}, rc::Rc};

use itertools::Itertools;

use crate::{
    context::EvaluationContext,
    environment::{Env, Frame},
    error::SchemeError,
    value::Value,
};

pub(crate) type EvaluationResult = Result<Value, SchemeError>;

pub(crate) type NativeFn = Box<dyn Fn(Vec<Value>, &mut EvaluationContext) -> EvaluationResult>;
pub(crate) type NativeEnvFn = Box<dyn Fn(Vec<Value>, &Env, &mut EvaluationContext) -> EvaluationResult>;

/// Handler for a special form. Receives the form's operands unevaluated.
pub(crate) type SpecialForm = fn(&Value, &Env, &mut EvaluationContext) -> EvaluationResult;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Self::Exact(n) => count == n,
            Self::AtLeast(n) => count >= n,
            Self::Between(low, high) => (low..=high).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{}", n),
            Self::AtLeast(n) => write!(f, "at least {}", n),
            Self::Between(low, high) => write!(f, "{} to {}", low, high),
        }
    }
}

pub(crate) enum Native {
    Plain(NativeFn),
    // Receives the environment of the caller as well
    WithEnv(NativeEnvFn),
}

/// A procedure implemented in Rust.
pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub(crate) function: Native,
}

impl Primitive {
    fn apply(&self, values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
        if !self.arity.accepts(values.len()) {
            return Err(SchemeError::Arity(format!(
                "wrong number of arguments to {}: expected {}, got {}",
                self.name, self.arity, values.len()
            )));
        }

        match &self.function {
            Native::Plain(function) => function(values, ctx),
            Native::WithEnv(function) => function(values, env, ctx),
        }
    }
}

/// A procedure created by `lambda` or the `define` shorthand. It closes
/// over the frame it was defined in.
pub struct Lambda {
    formals: Value,
    body: Vec<Value>,
    env: Env,
}

impl Lambda {
    fn apply(&self, values: Vec<Value>, ctx: &mut EvaluationContext) -> EvaluationResult {
        let frame = Frame::make_child_frame(&self.env, &self.formals, values)?;
        evaluate_all(&self.body, &frame, ctx)
    }
}

#[derive(Clone)]
pub enum Procedure {
    Primitive(Rc<Primitive>),
    Compound(Rc<Lambda>),
}

impl Procedure {
    pub(crate) fn primitive(name: &'static str, arity: Arity, function: Native) -> Self {
        Self::Primitive(Rc::new(Primitive { name, arity, function }))
    }

    /// Applies the procedure to already evaluated arguments. `env` is the
    /// caller's environment; only environment-aware primitives see it.
    pub fn apply(&self, values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
        match self {
            Self::Primitive(primitive) => primitive.apply(values, env, ctx),
            Self::Compound(lambda) => lambda.apply(values, ctx),
        }
    }

    pub(crate) fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => Rc::ptr_eq(a, b),
            (Self::Compound(a), Self::Compound(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(primitive) => write!(f, "#[{}]", primitive.name),
            Self::Compound(lambda) => write!(f, "(lambda {} {})", lambda.formals, lambda.body.iter().join(" ")),
        }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(primitive) => write!(f, "Primitive({})", primitive.name),
            Self::Compound(lambda) => write!(f, "Compound({}, {:?})", self, lambda.env),
        }
    }
}

/// Splits a form's operand list, checking it is a proper list with between
/// `min` and `max` elements.
fn operands<'a>(expressions: &'a Value, form: &str, min: usize, max: Option<usize>) -> Result<Vec<&'a Value>, SchemeError> {
    let operands = expressions.iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| SchemeError::Evaluation(format!("badly formed expression: {}", expressions)))?;

    if operands.len() < min {
        return Err(SchemeError::Evaluation(format!("too few operands in {}: {}", form, expressions)));
    }
    if max.is_some_and(|max| operands.len() > max) {
        return Err(SchemeError::Evaluation(format!("too many operands in {}: {}", form, expressions)));
    }

    Ok(operands)
}

/// Checks that `formals` is a list of distinct symbols. A symbol in tail
/// position is allowed and names the rest parameter.
fn check_formals(formals: &Value) -> Result<(), SchemeError> {
    let mut seen = HashSet::new();

    for formal in formals.iter() {
        let (Ok(formal) | Err(formal)) = formal;
        let Some(symbol) = formal.as_symbol() else {
            return Err(SchemeError::Evaluation(format!("non-symbol: {}", formal)));
        };
        if !seen.insert(symbol.clone()) {
            return Err(SchemeError::Evaluation(format!("duplicate symbol: {}", symbol)));
        }
    }

    Ok(())
}

fn make_lambda(formals: &Value, body: &[&Value], env: &Env) -> EvaluationResult {
    check_formals(formals)?;
    Ok(Value::Procedure(Procedure::Compound(Rc::new(Lambda {
        formals: formals.clone(),
        body: body.iter().map(|expression| (*expression).clone()).collect(),
        env: Rc::clone(env),
    }))))
}

fn evaluate_quote(expressions: &Value, _env: &Env, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let operands = operands(expressions, "quote", 1, Some(1))?;
    Ok(operands[0].clone())
}

fn evaluate_if(expressions: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    // Anything but #f counts as true; a missing alternative yields the
    // unspecified value
    let operands = operands(expressions, "if", 2, Some(3))?;

    if evaluate(operands[0], env, ctx)?.is_true() {
        evaluate(operands[1], env, ctx)
    } else if let Some(alternative) = operands.get(2) {
        evaluate(alternative, env, ctx)
    } else {
        Ok(Value::Unspecified)
    }
}

fn evaluate_define(expressions: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    // Either (define name value), or the procedure shorthand
    // (define (name . formals) body...)
    let operands = operands(expressions, "define", 2, None)?;

    match operands[0] {
        Value::Symbol(name) => {
            if operands.len() > 2 {
                return Err(SchemeError::Evaluation(format!("too many operands in define: {}", expressions)));
            }
            let value = evaluate(operands[1], env, ctx)?;
            env.define(name, value);
            Ok(Value::Symbol(name.clone()))
        }
        Value::Pair(signature) => {
            let Some(name) = signature.first.as_symbol() else {
                return Err(SchemeError::Evaluation(format!("non-symbol: {}", signature.first)));
            };
            let procedure = make_lambda(&signature.rest, &operands[1..], env)?;
            env.define(name, procedure);
            Ok(Value::Symbol(name.clone()))
        }
        other => Err(SchemeError::Evaluation(format!("non-symbol: {}", other))),
    }
}

fn evaluate_lambda(expressions: &Value, env: &Env, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let operands = operands(expressions, "lambda", 2, None)?;
    make_lambda(operands[0], &operands[1..], env)
}

fn evaluate_begin(expressions: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    let operands = operands(expressions, "begin", 1, None)?;
    evaluate_all(operands, env, ctx)
}

fn evaluate_and(expressions: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    // Stops at the first false value; otherwise the last value, or #t when
    // there are no operands at all
    let mut result = Value::Boolean(true);
    for expression in operands(expressions, "and", 0, None)? {
        result = evaluate(expression, env, ctx)?;
        if !result.is_true() {
            break;
        }
    }
    Ok(result)
}

fn evaluate_or(expressions: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    for expression in operands(expressions, "or", 0, None)? {
        let value = evaluate(expression, env, ctx)?;
        if value.is_true() {
            return Ok(value);
        }
    }
    Ok(Value::Boolean(false))
}

fn evaluate_cond(expressions: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    let clauses = operands(expressions, "cond", 0, None)?;

    for (index, clause) in clauses.iter().enumerate() {
        let clause = operands(clause, "cond clause", 1, None)?;

        let test = match clause[0].as_symbol() {
            Some(symbol) if &**symbol == "else" => {
                if index + 1 != clauses.len() {
                    return Err(SchemeError::Evaluation("else must be last".to_owned()));
                }
                Value::Boolean(true)
            }
            _ => evaluate(clause[0], env, ctx)?,
        };

        if test.is_true() {
            if clause.len() == 1 {
                return Ok(test);
            }
            return evaluate_all(clause[1..].iter().copied(), env, ctx);
        }
    }

    Ok(Value::Unspecified)
}

fn evaluate_let(expressions: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    // Every binding is evaluated in the outer environment before any of
    // them is visible
    let parts = operands(expressions, "let", 2, None)?;
    if !parts[0].is_list() {
        return Err(SchemeError::Evaluation(format!("bad bindings list in let form: {}", parts[0])));
    }

    let bindings = parts[0].iter()
        .flatten()
        .map(|binding| operands(binding, "let binding", 2, Some(2)))
        .collect::<Result<Vec<_>, _>>()?;

    let names = Value::list(bindings.iter().map(|binding| binding[0].clone()).collect_vec());
    check_formals(&names)?;

    let values = bindings.iter()
        .map(|binding| evaluate(binding[1], env, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let frame = Frame::make_child_frame(env, &names, values)?;
    evaluate_all(parts[1..].iter().copied(), &frame, ctx)
}

/// The closed table of special forms, consulted before ordinary calls.
pub(crate) fn special_forms() -> HashMap<&'static str, SpecialForm> {
    let forms: [(&'static str, SpecialForm); 9] = [
        ("and", evaluate_and),
        ("begin", evaluate_begin),
        ("cond", evaluate_cond),
        ("define", evaluate_define),
        ("if", evaluate_if),
        ("lambda", evaluate_lambda),
        ("let", evaluate_let),
        ("or", evaluate_or),
        ("quote", evaluate_quote),
    ];
    HashMap::from(forms)
}

/// Evaluates `expressions` in order and returns the value of the last one.
pub(crate) fn evaluate_all<'a, I>(expressions: I, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut result = Value::Unspecified;
    for expression in expressions {
        result = evaluate(expression, env, ctx)?;
    }
    Ok(result)
}

fn evaluate_operands(operands: &Value, env: &Env, ctx: &mut EvaluationContext) -> Result<Vec<Value>, SchemeError> {
    operands.iter()
        .flatten()
        .map(|operand| evaluate(operand, env, ctx))
        .collect()
}

fn evaluate_expression(expression: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    let pair = match expression {
        Value::Symbol(name) => return env.lookup(name),
        Value::Pair(pair) => pair,
        atom => return Ok(atom.clone()),
    };

    if !expression.is_list() {
        return Err(SchemeError::Evaluation(format!("malformed list: {}", expression)));
    }

    if let Some(form) = pair.first.as_symbol().and_then(|name| ctx.special_form(name)) {
        return form(&pair.rest, env, ctx);
    }

    let procedure = match evaluate(&pair.first, env, ctx)? {
        Value::Procedure(procedure) => procedure,
        other => return Err(SchemeError::Type(format!("{} is not callable: {}", other.type_name(), other))),
    };

    let values = evaluate_operands(&pair.rest, env, ctx)?;
    procedure.apply(values, env, ctx)
}

/// Evaluates `expression` in `env`.
///
/// Nesting is bounded by the context's depth limit; running past it fails
/// with [SchemeError::StackExhausted] instead of overflowing the stack.
pub fn evaluate(expression: &Value, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    ctx.enter()?;
    let result = evaluate_expression(expression, env, ctx);
    ctx.leave();
    result
}
