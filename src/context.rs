use std::{
    collections::HashMap,
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    builtin::builtin_frame,
    environment::Env,
    error::SchemeError,
    interpreter::{evaluate, SpecialForm, special_forms},
    parser::parse_all,
    value::Value,
};


/// Default limit on evaluation nesting before [SchemeError::StackExhausted].
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Everything an evaluation needs besides the expression and its
/// environment: the global frame, the special-form table, where output goes
/// how deep evaluation is allowed to nest, and the interrupt flag a signal
/// handler raises to abort the running expression.
///
/// The special-form table and the global frame are built once here and the
/// table is never modified afterwards.
pub struct EvaluationContext {
    global: Env,
    special_forms: HashMap<&'static str, SpecialForm>,
    output: Box<dyn Write>,
    depth: usize,
    max_depth: usize,
    interrupt: Arc<AtomicBool>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self {
            global: builtin_frame(),
            special_forms: special_forms(),
            output: Box::new(std::io::stdout()),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sends everything the program prints to `output` instead of stdout.
    pub fn with_output<W: Write + 'static>(mut self, output: W) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Shares the flag that aborts evaluation once set, e.g. from a SIGINT
    /// handler running on another thread.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub fn reset_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }

    /// True while an expression is being evaluated, as during a `load`.
    pub(crate) fn is_evaluating(&self) -> bool {
        self.depth > 0
    }

    pub fn global(&self) -> &Env {
        &self.global
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    /// Evaluates one expression in the global frame.
    pub fn evaluate(&mut self, expression: &Value) -> Result<Value, SchemeError> {
        let global = self.global.clone();
        evaluate(expression, &global, self)
    }

    /// Reads every expression in `input` and evaluates them in order,
    /// returning the value of the last one.
    pub fn evaluate_str(&mut self, input: &str) -> Result<Value, SchemeError> {
        let mut result = Value::Unspecified;
        for expression in parse_all(input)? {
            result = self.evaluate(&expression)?;
        }
        Ok(result)
    }

    pub(crate) fn special_form(&self, name: &str) -> Option<SpecialForm> {
        self.special_forms.get(name).copied()
    }

    pub(crate) fn enter(&mut self) -> Result<(), SchemeError> {
        if self.is_interrupted() {
            return Err(SchemeError::Interrupted);
        }
        if self.depth >= self.max_depth {
            return Err(SchemeError::StackExhausted);
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SharedOutput;

    #[test]
    fn definitions_persist_between_calls() -> anyhow::Result<()> {
        let mut context = EvaluationContext::new().with_output(std::io::sink());
        context.evaluate_str("(define (spam) (* eggs 3))")?;
        assert!(matches!(context.evaluate_str("(spam)"), Err(SchemeError::Name(_))));
        context.evaluate_str("(define eggs 20)")?;
        assert_eq!(context.evaluate_str("(spam)")?, Value::Integer(60));

        Ok(())
    }

    #[test]
    fn output_is_redirected() -> anyhow::Result<()> {
        let output = SharedOutput::default();
        let mut context = EvaluationContext::new().with_output(output.clone());
        context.evaluate_str("(display \"a\") (print '(1 \"b\")) (newline)")?;
        assert_eq!(output.take(), "a(1 \"b\")\n\n");

        Ok(())
    }

    #[test]
    fn interrupts_abort_until_reset() -> anyhow::Result<()> {
        let mut context = EvaluationContext::new().with_output(std::io::sink());
        context.evaluate_str("(define (count n) (if (= n 0) 'done (count (- n 1))))")?;

        context.interrupt_handle().store(true, Ordering::Relaxed);
        assert_eq!(context.evaluate_str("(count 10)"), Err(SchemeError::Interrupted));
        assert_eq!(context.evaluate_str("1"), Err(SchemeError::Interrupted));

        context.reset_interrupt();
        assert_eq!(context.evaluate_str("(count 10)")?, Value::symbol("done"));
        assert!(!context.is_evaluating());

        Ok(())
    }

    #[test]
    fn special_forms_shadow_nothing_in_the_global_frame() {
        let context = EvaluationContext::new();
        assert!(context.special_form("if").is_some());
        assert!(context.special_form("car").is_none());
        assert!(context.global().lookup("if").is_err());
    }
}
