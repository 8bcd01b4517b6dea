use std::{fs, path::Path};

use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    buffer::{Buffer, LineReader, LineSource},
    context::EvaluationContext,
    environment::Env,
    error::SchemeError,
    interpreter::evaluate,
    parser::read,
    value::Value,
};


const PROMPT: &str = "scm> ";

/// Interactive line source. The first line of every expression gets the
/// `scm> ` prompt, continuation lines are indented to match.
pub struct InputReader {
    editor: DefaultEditor,
    continuing: bool,
}

impl InputReader {
    pub fn new() -> Result<Self, SchemeError> {
        let editor = DefaultEditor::new().map_err(|error| SchemeError::Io(error.to_string()))?;
        Ok(Self { editor, continuing: false })
    }
}

impl LineSource for InputReader {
    fn next_line(&mut self) -> Result<Option<String>, SchemeError> {
        let prompt = if self.continuing { " ".repeat(PROMPT.len()) } else { PROMPT.to_owned() };

        match self.editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.continuing = true;
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => Err(SchemeError::Interrupted),
            Err(ReadlineError::Eof) => Ok(None),
            Err(error) => Err(SchemeError::Io(error.to_string())),
        }
    }

    fn begin_expression(&mut self) {
        self.continuing = false;
    }
}

fn read_eval_print<S: LineSource>(
    buffer: &mut Buffer<S>,
    env: &Env,
    ctx: &mut EvaluationContext,
    quiet: bool,
) -> Result<(), SchemeError> {
    let expression = read(buffer)?;
    let value = evaluate(&expression, env, ctx)?;
    if !quiet && !matches!(value, Value::Unspecified) {
        writeln!(ctx.output(), "{}", value)?;
    }
    Ok(())
}

/// Reads and evaluates expressions from `source` in `env` until it runs
/// dry, printing each value unless `quiet` is set.
///
/// Errors are reported on the context's output along with the rest of the
/// offending line being dropped, and the loop carries on. An interrupt
/// abandons the current expression the same way. The loop only stops at the
/// end of input, or with [SchemeError::Exit] when the program asks to.
pub fn read_eval_print_loop<S: LineSource>(
    source: S,
    env: &Env,
    ctx: &mut EvaluationContext,
    quiet: bool,
) -> Result<(), SchemeError> {
    let mut buffer = Buffer::new(source);

    loop {
        buffer.begin_expression();
        let result = read_eval_print(&mut buffer, env, ctx, quiet);

        for error in buffer.take_errors() {
            eprintln!("{}", error);
        }

        match result {
            Ok(()) => {}
            Err(SchemeError::EndOfInput) => return Ok(()),
            Err(SchemeError::Exit) => return Err(SchemeError::Exit),
            // Inside a `load` the interrupt aborts the expression that loaded us
            Err(SchemeError::Interrupted) if ctx.is_evaluating() => return Err(SchemeError::Interrupted),
            Err(SchemeError::Interrupted) => {
                ctx.reset_interrupt();
                writeln!(ctx.output(), "\nKeyboardInterrupt")?;
                buffer.skip_line();
            }
            Err(error) => {
                if let SchemeError::Syntax(_) = error {
                    eprintln!("{}", buffer);
                }
                writeln!(ctx.output(), "{}", error)?;
                buffer.skip_line();
            }
        }
        ctx.output().flush()?;
    }
}

/// Runs the file at `path` through the loop in `env`.
pub fn load_file(path: &Path, quiet: bool, env: &Env, ctx: &mut EvaluationContext) -> Result<(), SchemeError> {
    let source = fs::read_to_string(path)
        .map_err(|error| SchemeError::Io(format!("{}: {}", path.display(), error)))?;
    read_eval_print_loop(LineReader::new(source.lines()), env, ctx, quiet)
}
