use core::fmt;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use itertools::Itertools;

use crate::{error::SchemeError, value::Value};


pub type Env = Rc<Frame>;

/// One scope of bindings. Frames are chained through their parent up to the
/// global frame, which is the only one without a parent.
///
/// Bindings are only ever added or overwritten, never removed, so closures
/// can keep a frame alive and share it freely.
pub struct Frame {
    bindings: RefCell<HashMap<Rc<str>, Value>>,
    parent: Option<Env>,
}

impl Frame {
    pub fn global() -> Env {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(Self {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Binds `symbol` in this frame, shadowing any binding further out.
    pub fn define(&self, symbol: &str, value: Value) {
        self.bindings.borrow_mut().insert(Rc::from(symbol), value);
    }

    pub fn lookup(&self, symbol: &str) -> Result<Value, SchemeError> {
        if let Some(value) = self.bindings.borrow().get(symbol) {
            return Ok(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.lookup(symbol),
            None => Err(SchemeError::Name(format!("unbound identifier: {}", symbol))),
        }
    }

    /// Creates a frame below `parent` binding `formals` to `values`.
    ///
    /// `formals` is a list of symbols, optionally improper: a symbol in tail
    /// position (or in place of the whole list) collects the remaining
    /// values into a fresh list.
    pub fn make_child_frame(parent: &Env, formals: &Value, values: Vec<Value>) -> Result<Env, SchemeError> {
        let required = formals.iter().filter(Result::is_ok).count();
        let variadic = !matches!(formals.iter().last(), None | Some(Ok(_)));
        if values.len() < required || (!variadic && values.len() > required) {
            return Err(SchemeError::Arity(format!(
                "expected {}{} argument{}, got {}",
                if variadic { "at least " } else { "" },
                required,
                if required == 1 { "" } else { "s" },
                values.len()
            )));
        }

        let child = Self::child(parent);
        let mut values = values.into_iter();
        for formal in formals.iter() {
            match formal {
                Ok(Value::Symbol(name)) => {
                    // Arity was checked above.
                    if let Some(value) = values.next() {
                        child.define(name, value);
                    }
                }
                Err(Value::Symbol(rest)) => child.define(rest, Value::list(values.by_ref().collect_vec())),
                Ok(other) | Err(other) => return Err(SchemeError::Evaluation(format!("non-symbol: {}", other))),
            }
        }

        Ok(child)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            return write!(f, "<Global Frame>");
        }

        let bindings = self.bindings.borrow()
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .sorted()
            .join(", ");
        match &self.parent {
            Some(parent) => write!(f, "<{{{}}} -> {:?}>", bindings, parent),
            None => write!(f, "<{{{}}}>", bindings),
        }
    }
}
