
mod buffer;
mod builtin;
mod context;
mod environment;
mod error;
mod interpreter;
mod parser;
mod repl;
mod tokens;
mod value;

#[cfg(test)]
mod test_utils;

pub use buffer::{Buffer, LineReader, LineSource};
pub use context::{EvaluationContext, DEFAULT_MAX_DEPTH};
pub use environment::{Env, Frame};
pub use error::{LexError, SchemeError};
pub use interpreter::{evaluate, Arity, Procedure};
pub use parser::{parse, parse_all, read, MAX_NESTING};
pub use repl::{load_file, read_eval_print_loop, InputReader};
pub use tokens::{tokenize_line, Token, TokenizedLine};
pub use value::{is_eq, Pair, Value};
