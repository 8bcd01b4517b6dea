use core::fmt;
use std::{mem, rc::Rc};

use itertools::Itertools;

use crate::{error::SchemeError, interpreter::Procedure, tokens::Escaped};


#[derive(Debug)]
pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

fn detach(value: &mut Value, pending: &mut Vec<Rc<Pair>>) {
    if let Value::Pair(_) = value {
        if let Value::Pair(pair) = mem::replace(value, Value::Nil) {
            pending.push(pair);
        }
    }
}

// Long or deeply nested lists would otherwise be freed recursively.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach(&mut self.first, &mut pending);
        detach(&mut self.rest, &mut pending);

        while let Some(pair) = pending.pop() {
            if let Ok(mut pair) = Rc::try_unwrap(pair) {
                detach(&mut pair.first, &mut pending);
                detach(&mut pair.rest, &mut pending);
            }
        }
    }
}

/// Every datum of the language. Code is data, so this is also the
/// expression tree handed to the evaluator.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Symbol(Rc<str>),
    Str(Rc<str>),
    Nil,
    Pair(Rc<Pair>),
    Procedure(Procedure),
    Unspecified,
}

impl Value {
    pub fn cons(first: Value, rest: Value) -> Self {
        Self::Pair(Rc::new(Pair { first, rest }))
    }

    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Self {
        Self::Str(Rc::from(text))
    }

    /// Builds a fresh proper list from `values`.
    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        values.into_iter()
            .rev()
            .fold(Self::Nil, |rest, first| Self::cons(first, rest))
    }

    pub fn is_true(&self) -> bool {
        !matches!(self, Self::Boolean(false))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    pub fn as_symbol(&self) -> Option<&Rc<str>> {
        match self {
            Self::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Self::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        let mut current = self;
        loop {
            match current {
                Self::Nil => return true,
                Self::Pair(pair) => current = &pair.rest,
                _ => return false,
            }
        }
    }

    /// Iterates the elements of a list. Improper tails are yielded as a
    /// trailing `Err` so callers can decide how strict to be.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: Some(self) }
    }

    /// Collects a proper list into a vector, failing with a type error that
    /// names the whole value otherwise.
    pub fn to_vec(&self) -> Result<Vec<Value>, SchemeError> {
        self.iter()
            .map(|item| item.cloned().map_err(|_| SchemeError::Type(format!("invalid list: {}", self))))
            .collect()
    }

    pub fn len(&self) -> Result<usize, SchemeError> {
        let mut count = 0;
        for item in self.iter() {
            item.map_err(|_| SchemeError::Type(format!("invalid list: {}", self)))?;
            count += 1;
        }
        Ok(count)
    }

    /// Applies `f` to every element, building a fresh list.
    pub fn map<F>(&self, mut f: F) -> Result<Value, SchemeError>
    where
        F: FnMut(&Value) -> Result<Value, SchemeError>,
    {
        let mapped = self.to_vec()?
            .iter()
            .map(|item| f(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::list(mapped))
    }

    /// Name of the value's type as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Symbol(_) => "symbol",
            Self::Str(_) => "string",
            Self::Nil => "nil",
            Self::Pair(_) => "pair",
            Self::Procedure(_) => "procedure",
            Self::Unspecified => "unspecified",
        }
    }

    /// The `display` form: like the write form, but strings are shown raw.
    pub fn display_string(&self) -> String {
        match self {
            Self::Str(text) => text.to_string(),
            other => other.to_string(),
        }
    }
}

pub struct ListIter<'a> {
    current: Option<&'a Value>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Result<&'a Value, &'a Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current.take()? {
            Value::Nil => None,
            Value::Pair(pair) => {
                self.current = Some(&pair.rest);
                Some(Ok(&pair.first))
            }
            tail => Some(Err(tail)),
        }
    }
}

fn numbers_equal(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => Some(a == b),
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => Some(*a as f64 == *b),
        (Value::Float(a), Value::Float(b)) => Some(a == b),
        _ => None,
    }
}

/// `eq?`: numbers and symbols compare by value, compound values by identity.
pub fn is_eq(a: &Value, b: &Value) -> bool {
    if let Some(equal) = numbers_equal(a, b) {
        return equal;
    }
    match (a, b) {
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Nil, Value::Nil) | (Value::Unspecified, Value::Unspecified) => true,
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
        (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
        (Value::Procedure(a), Value::Procedure(b)) => a.same(b),
        _ => false,
    }
}

/// Structural equality, as `equal?`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];

        while let Some((a, b)) = pending.pop() {
            let equal = match numbers_equal(a, b) {
                Some(equal) => equal,
                None => match (a, b) {
                    (Self::Str(a), Self::Str(b)) => a == b,
                    (Self::Pair(a), Self::Pair(b)) => {
                        if !Rc::ptr_eq(a, b) {
                            pending.push((&a.rest, &b.rest));
                            pending.push((&a.first, &b.first));
                        }
                        true
                    }
                    (a, b) => is_eq(a, b),
                },
            };
            if !equal {
                return false;
            }
        }

        true
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Boolean(true) => write!(f, "#t"),
            Self::Boolean(false) => write!(f, "#f"),
            Self::Symbol(name) => write!(f, "{}", name),
            Self::Str(text) => write!(f, "{}", Escaped(text)),
            Self::Nil => write!(f, "()"),
            Self::Procedure(procedure) => write!(f, "{}", procedure),
            Self::Unspecified => write!(f, "undefined"),
            Self::Pair(_) => {
                let mut items = Vec::new();
                let mut tail = None;
                for item in self.iter() {
                    match item {
                        Ok(item) => items.push(item),
                        Err(improper) => tail = Some(improper),
                    }
                }

                write!(f, "({}", items.iter().join(" "))?;
                if let Some(tail) = tail {
                    write!(f, " . {}", tail)?;
                }
                write!(f, ")")
            }
        }
    }
}
