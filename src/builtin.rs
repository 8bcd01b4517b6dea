use std::{cmp::Ordering, io::Write, path::PathBuf};

use crate::{
    context::EvaluationContext,
    environment::{Env, Frame},
    error::SchemeError,
    interpreter::{evaluate, Arity, EvaluationResult, Native, Procedure},
    repl::load_file,
    value::{is_eq, Value},
};


#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    fn into_value(self) -> Value {
        match self {
            Self::Integer(value) => Value::Integer(value),
            Self::Float(value) => Value::Float(value),
        }
    }

    /// Integral floats become integers, as long as they fit.
    fn simplify(self) -> Value {
        match self {
            Self::Float(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => Value::Integer(value as i64),
            other => other.into_value(),
        }
    }
}

fn integer_or_float(
    a: Number,
    b: Number,
    integer: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Number {
    match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => integer(a, b)
            .map(Number::Integer)
            .unwrap_or_else(|| Number::Float(float(a as f64, b as f64))),
        (a, b) => Number::Float(float(a.as_f64(), b.as_f64())),
    }
}

fn add(a: Number, b: Number) -> Number {
    integer_or_float(a, b, i64::checked_add, |a, b| a + b)
}

fn sub(a: Number, b: Number) -> Number {
    integer_or_float(a, b, i64::checked_sub, |a, b| a - b)
}

fn mul(a: Number, b: Number) -> Number {
    integer_or_float(a, b, i64::checked_mul, |a, b| a * b)
}

fn div(a: Number, b: Number) -> Result<Number, SchemeError> {
    if b.is_zero() {
        return Err(SchemeError::ZeroDivision("division by zero".to_owned()));
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

fn to_number(value: &Value, index: usize) -> Result<Number, SchemeError> {
    match value {
        Value::Integer(value) => Ok(Number::Integer(*value)),
        Value::Float(value) => Ok(Number::Float(*value)),
        other => Err(SchemeError::Type(format!("operand {} ({}) is not a number", index, other))),
    }
}

fn to_numbers(values: &[Value]) -> Result<Vec<Number>, SchemeError> {
    values.iter()
        .enumerate()
        .map(|(index, value)| to_number(value, index))
        .collect()
}

fn wrong_type(value: &Value, index: usize, name: &str) -> SchemeError {
    SchemeError::Type(format!("argument {} of {} has wrong type ({})", index, name, value.type_name()))
}

fn check_procedure<'v>(value: &'v Value, index: usize, name: &str) -> Result<&'v Procedure, SchemeError> {
    match value {
        Value::Procedure(procedure) => Ok(procedure),
        other => Err(wrong_type(other, index, name)),
    }
}

fn check_list(value: &Value, index: usize, name: &str) -> Result<Vec<Value>, SchemeError> {
    value.to_vec().map_err(|_| wrong_type(value, index, name))
}

fn builtin_add(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let numbers = to_numbers(&values)?;
    Ok(numbers.into_iter().fold(Number::Integer(0), add).simplify())
}

fn builtin_sub(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let numbers = to_numbers(&values)?;
    if numbers.len() == 1 {
        return Ok(sub(Number::Integer(0), numbers[0]).simplify());
    }
    Ok(numbers[1..].iter().copied().fold(numbers[0], sub).simplify())
}

fn builtin_mul(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let numbers = to_numbers(&values)?;
    Ok(numbers.into_iter().fold(Number::Integer(1), mul).simplify())
}

fn builtin_div(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let numbers = to_numbers(&values)?;
    if numbers.len() == 1 {
        return Ok(div(Number::Integer(1), numbers[0])?.simplify());
    }

    let mut result = numbers[0];
    for number in &numbers[1..] {
        result = div(result, *number)?;
    }
    Ok(result.simplify())
}

fn two_numbers(values: &[Value]) -> Result<(Number, Number), SchemeError> {
    Ok((to_number(&values[0], 0)?, to_number(&values[1], 1)?))
}

fn builtin_quotient(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let (a, b) = two_numbers(&values)?;
    if b.is_zero() {
        return Err(SchemeError::ZeroDivision("integer division by zero".to_owned()));
    }
    let quotient = integer_or_float(a, b, i64::checked_div, |a, b| (a / b).trunc());
    Ok(quotient.simplify())
}

fn builtin_remainder(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    // Takes the sign of the dividend
    let (a, b) = two_numbers(&values)?;
    if b.is_zero() {
        return Err(SchemeError::ZeroDivision("integer division by zero".to_owned()));
    }
    let remainder = integer_or_float(a, b, |a, b| Some(a.wrapping_rem(b)), |a, b| a % b);
    Ok(remainder.into_value())
}

fn builtin_modulo(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    // Takes the sign of the divisor
    let (a, b) = two_numbers(&values)?;
    if b.is_zero() {
        return Err(SchemeError::ZeroDivision("integer division by zero".to_owned()));
    }
    let modulo = integer_or_float(
        a,
        b,
        |a, b| {
            let remainder = a.wrapping_rem(b);
            Some(if remainder != 0 && (remainder < 0) != (b < 0) { remainder + b } else { remainder })
        },
        |a, b| {
            let remainder = a % b;
            if remainder != 0.0 && (remainder < 0.0) != (b < 0.0) { remainder + b } else { remainder }
        },
    );
    Ok(modulo.into_value())
}

fn builtin_expt(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let (base, exponent) = two_numbers(&values)?;
    let result = integer_or_float(
        base,
        exponent,
        |base, exponent| u32::try_from(exponent).ok().and_then(|exponent| base.checked_pow(exponent)),
        f64::powf,
    );
    Ok(result.into_value())
}

fn builtin_abs(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let result = match to_number(&values[0], 0)? {
        Number::Integer(value) => value.checked_abs()
            .map(Value::Integer)
            .unwrap_or_else(|| Value::Float((value as f64).abs())),
        Number::Float(value) => Value::Float(value.abs()),
    };
    Ok(result)
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

fn builtin_compare<F: Fn(Ordering) -> bool>(values: Vec<Value>, f: F) -> EvaluationResult {
    let numbers = to_numbers(&values)?;
    let holds = numbers.windows(2)
        .all(|pair| compare_numbers(pair[0], pair[1]).is_some_and(&f));
    Ok(Value::Boolean(holds))
}

fn builtin_num_eq(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    builtin_compare(values, Ordering::is_eq)
}

fn builtin_less(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    builtin_compare(values, Ordering::is_lt)
}

fn builtin_greater(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    builtin_compare(values, Ordering::is_gt)
}

fn builtin_less_eq(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    builtin_compare(values, Ordering::is_le)
}

fn builtin_greater_eq(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    builtin_compare(values, Ordering::is_ge)
}

fn math_unary(values: &[Value], f: fn(f64) -> f64) -> EvaluationResult {
    Ok(Value::Float(f(to_number(&values[0], 0)?.as_f64())))
}

fn math_binary(values: &[Value], f: fn(f64, f64) -> f64) -> EvaluationResult {
    let (a, b) = two_numbers(values)?;
    Ok(Value::Float(f(a.as_f64(), b.as_f64())))
}

fn math_rounding(values: &[Value], f: fn(f64) -> f64) -> EvaluationResult {
    Ok(Number::Float(f(to_number(&values[0], 0)?.as_f64())).simplify())
}

fn builtin_log(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let x = to_number(&values[0], 0)?.as_f64();
    match values.get(1) {
        Some(base) => Ok(Value::Float(x.ln() / to_number(base, 1)?.as_f64().ln())),
        None => Ok(Value::Float(x.ln())),
    }
}

fn builtin_is_even(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let even = match to_number(&values[0], 0)? {
        Number::Integer(value) => value.rem_euclid(2) == 0,
        Number::Float(value) => value.rem_euclid(2.0) == 0.0,
    };
    Ok(Value::Boolean(even))
}

fn builtin_is_odd(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let odd = match to_number(&values[0], 0)? {
        Number::Integer(value) => value.rem_euclid(2) == 1,
        Number::Float(value) => value.rem_euclid(2.0) == 1.0,
    };
    Ok(Value::Boolean(odd))
}

fn builtin_is_zero(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    Ok(Value::Boolean(to_number(&values[0], 0)?.is_zero()))
}

fn builtin_is_integer(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let integer = match &values[0] {
        Value::Integer(_) => true,
        Value::Float(value) => value.fract() == 0.0,
        _ => false,
    };
    Ok(Value::Boolean(integer))
}

fn predicate(values: Vec<Value>, test: fn(&Value) -> bool) -> EvaluationResult {
    Ok(Value::Boolean(test(&values[0])))
}

fn builtin_cons(mut values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let rest = values.pop().unwrap_or(Value::Nil);
    let first = values.pop().unwrap_or(Value::Nil);
    Ok(Value::cons(first, rest))
}

fn builtin_car(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    match values[0].as_pair() {
        Some(pair) => Ok(pair.first.clone()),
        None => Err(wrong_type(&values[0], 0, "car")),
    }
}

fn builtin_cdr(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    match values[0].as_pair() {
        Some(pair) => Ok(pair.rest.clone()),
        None => Err(wrong_type(&values[0], 0, "cdr")),
    }
}

fn builtin_list(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    Ok(Value::list(values))
}

fn builtin_length(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let length = values[0].len().map_err(|_| wrong_type(&values[0], 0, "length"))?;
    Ok(Value::Integer(length as i64))
}

fn builtin_append(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    // The last argument is shared, not copied
    let Some((last, init)) = values.split_last() else {
        return Ok(Value::Nil);
    };

    let mut result = last.clone();
    for (index, value) in init.iter().enumerate().rev() {
        let items = check_list(value, index, "append")?;
        result = items.into_iter().rev().fold(result, |rest, first| Value::cons(first, rest));
    }
    Ok(result)
}

fn builtin_is_eq(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    Ok(Value::Boolean(is_eq(&values[0], &values[1])))
}

fn builtin_is_equal(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    Ok(Value::Boolean(values[0] == values[1]))
}

fn builtin_display(values: Vec<Value>, ctx: &mut EvaluationContext) -> EvaluationResult {
    write!(ctx.output(), "{}", values[0].display_string())?;
    Ok(Value::Unspecified)
}

fn builtin_print(values: Vec<Value>, ctx: &mut EvaluationContext) -> EvaluationResult {
    writeln!(ctx.output(), "{}", values[0])?;
    Ok(Value::Unspecified)
}

fn builtin_newline(_values: Vec<Value>, ctx: &mut EvaluationContext) -> EvaluationResult {
    writeln!(ctx.output())?;
    ctx.output().flush()?;
    Ok(Value::Unspecified)
}

fn builtin_error(values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    let message = values.first().map(Value::display_string).unwrap_or_default();
    Err(SchemeError::User(message))
}

fn builtin_exit(_values: Vec<Value>, _ctx: &mut EvaluationContext) -> EvaluationResult {
    Err(SchemeError::Exit)
}

fn builtin_map(values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    let function = check_procedure(&values[0], 0, "map")?;
    let items = check_list(&values[1], 1, "map")?;

    let mapped = items.into_iter()
        .map(|item| function.apply(vec![item], env, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::list(mapped))
}

fn builtin_filter(values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    let function = check_procedure(&values[0], 0, "filter")?;
    let items = check_list(&values[1], 1, "filter")?;

    let mut kept = vec![];
    for item in items {
        if function.apply(vec![item.clone()], env, ctx)?.is_true() {
            kept.push(item);
        }
    }
    Ok(Value::list(kept))
}

fn builtin_reduce(values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    // Without an initial value the first element starts the fold
    let function = check_procedure(&values[0], 0, "reduce")?;
    let mut items = check_list(&values[1], 1, "reduce")?.into_iter();

    let initial = match values.get(2) {
        Some(initial) => Some(initial.clone()),
        None => items.next(),
    };
    let Some(mut accumulator) = initial else {
        return Err(wrong_type(&values[1], 1, "reduce"));
    };

    for item in items {
        accumulator = function.apply(vec![accumulator, item], env, ctx)?;
    }
    Ok(accumulator)
}

fn builtin_eval(values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    evaluate(&values[0], env, ctx)
}

fn builtin_apply(values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    let function = check_procedure(&values[0], 0, "apply")?;
    let arguments = check_list(&values[1], 1, "apply")?;
    function.apply(arguments, env, ctx)
}

fn builtin_load(values: Vec<Value>, env: &Env, ctx: &mut EvaluationContext) -> EvaluationResult {
    let name = match &values[0] {
        Value::Str(name) | Value::Symbol(name) => name.to_string(),
        other => return Err(wrong_type(other, 0, "load")),
    };
    let quiet = values.get(1).map_or(true, Value::is_true);

    let path = PathBuf::from(&name);
    let path = if path.exists() { path } else { PathBuf::from(format!("{}.scm", name)) };
    load_file(&path, quiet, env, ctx)?;
    Ok(Value::Unspecified)
}

fn primitive<F>(name: &'static str, arity: Arity, function: F) -> (&'static str, Value)
where
    F: Fn(Vec<Value>, &mut EvaluationContext) -> EvaluationResult + 'static,
{
    (name, Value::Procedure(Procedure::primitive(name, arity, Native::Plain(Box::new(function)))))
}

fn primitive_with_env<F>(name: &'static str, arity: Arity, function: F) -> (&'static str, Value)
where
    F: Fn(Vec<Value>, &Env, &mut EvaluationContext) -> EvaluationResult + 'static,
{
    (name, Value::Procedure(Procedure::primitive(name, arity, Native::WithEnv(Box::new(function)))))
}

fn predicates() -> Vec<(&'static str, Value)> {
    let tests: [(&'static str, fn(&Value) -> bool); 10] = [
        ("pair?", |value| matches!(value, Value::Pair(_))),
        ("null?", |value| matches!(value, Value::Nil)),
        ("list?", Value::is_list),
        ("number?", Value::is_number),
        ("symbol?", |value| matches!(value, Value::Symbol(_))),
        ("string?", |value| matches!(value, Value::Str(_))),
        ("boolean?", |value| matches!(value, Value::Boolean(_))),
        ("procedure?", |value| matches!(value, Value::Procedure(_))),
        ("atom?", |value| matches!(value, Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::Symbol(_) | Value::Nil)),
        ("not", |value| !value.is_true()),
    ];

    tests.into_iter()
        .map(|(name, test)| primitive(name, Arity::Exact(1), move |values, _ctx| predicate(values, test)))
        .collect()
}

fn math_functions() -> Vec<(&'static str, Value)> {
    let unary: [(&'static str, fn(f64) -> f64); 19] = [
        ("acos", f64::acos),
        ("acosh", f64::acosh),
        ("asin", f64::asin),
        ("asinh", f64::asinh),
        ("atan", f64::atan),
        ("atanh", f64::atanh),
        ("cos", f64::cos),
        ("cosh", f64::cosh),
        ("degrees", f64::to_degrees),
        ("log10", f64::log10),
        ("log1p", f64::ln_1p),
        ("log2", f64::log2),
        ("radians", f64::to_radians),
        ("sin", f64::sin),
        ("sinh", f64::sinh),
        ("sqrt", f64::sqrt),
        ("tan", f64::tan),
        ("tanh", f64::tanh),
        ("exp", f64::exp),
    ];
    let binary: [(&'static str, fn(f64, f64) -> f64); 2] = [
        ("atan2", f64::atan2),
        ("copysign", f64::copysign),
    ];
    let rounding: [(&'static str, fn(f64) -> f64); 3] = [
        ("ceil", f64::ceil),
        ("floor", f64::floor),
        ("trunc", f64::trunc),
    ];

    let mut functions = vec![primitive("log", Arity::Between(1, 2), builtin_log)];
    functions.extend(unary.into_iter()
        .map(|(name, f)| primitive(name, Arity::Exact(1), move |values, _ctx| math_unary(&values, f))));
    functions.extend(binary.into_iter()
        .map(|(name, f)| primitive(name, Arity::Exact(2), move |values, _ctx| math_binary(&values, f))));
    functions.extend(rounding.into_iter()
        .map(|(name, f)| primitive(name, Arity::Exact(1), move |values, _ctx| math_rounding(&values, f))));
    functions
}

/// Builds the global frame with every primitive procedure bound.
pub(crate) fn builtin_frame() -> Env {
    let frame = Frame::global();

    let primitives = [
        primitive("+", Arity::AtLeast(0), builtin_add),
        primitive("-", Arity::AtLeast(1), builtin_sub),
        primitive("*", Arity::AtLeast(0), builtin_mul),
        primitive("/", Arity::AtLeast(1), builtin_div),
        primitive("quotient", Arity::Exact(2), builtin_quotient),
        primitive("remainder", Arity::Exact(2), builtin_remainder),
        primitive("modulo", Arity::Exact(2), builtin_modulo),
        primitive("expt", Arity::Exact(2), builtin_expt),
        primitive("abs", Arity::Exact(1), builtin_abs),

        primitive("=", Arity::AtLeast(2), builtin_num_eq),
        primitive("<", Arity::AtLeast(2), builtin_less),
        primitive(">", Arity::AtLeast(2), builtin_greater),
        primitive("<=", Arity::AtLeast(2), builtin_less_eq),
        primitive(">=", Arity::AtLeast(2), builtin_greater_eq),

        primitive("even?", Arity::Exact(1), builtin_is_even),
        primitive("odd?", Arity::Exact(1), builtin_is_odd),
        primitive("zero?", Arity::Exact(1), builtin_is_zero),
        primitive("integer?", Arity::Exact(1), builtin_is_integer),
        primitive("eq?", Arity::Exact(2), builtin_is_eq),
        primitive("equal?", Arity::Exact(2), builtin_is_equal),

        primitive("cons", Arity::Exact(2), builtin_cons),
        primitive("car", Arity::Exact(1), builtin_car),
        primitive("cdr", Arity::Exact(1), builtin_cdr),
        primitive("list", Arity::AtLeast(0), builtin_list),
        primitive("length", Arity::Exact(1), builtin_length),
        primitive("append", Arity::AtLeast(0), builtin_append),

        primitive("display", Arity::Exact(1), builtin_display),
        primitive("print", Arity::Exact(1), builtin_print),
        primitive("newline", Arity::Exact(0), builtin_newline),
        primitive("error", Arity::Between(0, 1), builtin_error),
        primitive("exit", Arity::Exact(0), builtin_exit),

        primitive_with_env("map", Arity::Exact(2), builtin_map),
        primitive_with_env("filter", Arity::Exact(2), builtin_filter),
        primitive_with_env("reduce", Arity::Between(2, 3), builtin_reduce),
        primitive_with_env("eval", Arity::Exact(1), builtin_eval),
        primitive_with_env("apply", Arity::Exact(2), builtin_apply),
        primitive_with_env("load", Arity::Between(1, 2), builtin_load),
    ];

    for (name, value) in primitives.into_iter().chain(predicates()).chain(math_functions()) {
        frame.define(name, value);
    }
    frame.define("undefined", Value::Unspecified);

    frame
}
