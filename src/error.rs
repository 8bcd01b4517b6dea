use core::fmt;

use thiserror::Error;


/// Errors and control signals produced while reading or evaluating.
///
/// Everything except the control signals ([SchemeError::EndOfInput],
/// [SchemeError::Interrupted] and [SchemeError::Exit]) aborts only the
/// top-level expression being evaluated; the loop reports it and resumes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemeError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("NameError: {0}")]
    Name(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ArityError: {0}")]
    Arity(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),

    #[error("EvaluationError: {0}")]
    Evaluation(String),

    #[error("Error: {0}")]
    User(String),

    #[error("StackExhausted: maximum recursion depth exceeded")]
    StackExhausted,

    #[error("IOError: {0}")]
    Io(String),

    #[error("end of input")]
    EndOfInput,

    #[error("KeyboardInterrupt")]
    Interrupted,

    #[error("exit")]
    Exit,
}

impl SchemeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "SyntaxError",
            Self::Name(_) => "NameError",
            Self::Type(_) => "TypeError",
            Self::Arity(_) => "ArityError",
            Self::ZeroDivision(_) => "ZeroDivisionError",
            Self::Evaluation(_) => "EvaluationError",
            Self::User(_) => "Error",
            Self::StackExhausted => "StackExhausted",
            Self::Io(_) => "IOError",
            Self::EndOfInput => "EndOfInput",
            Self::Interrupted => "Interrupted",
            Self::Exit => "Exit",
        }
    }

    /// Control signals terminate a loop instead of being reported.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::EndOfInput | Self::Interrupted | Self::Exit)
    }
}

impl From<std::io::Error> for SchemeError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// A malformed token. Never fatal: the tokenizer drops the token, records
/// one of these and keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub text: String,
    pub column: usize,
    pub line: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "warning: invalid token: {}", self.text)?;
        writeln!(f, "    {}", self.line)?;
        write!(f, "    {}^", " ".repeat(self.column))
    }
}

impl std::error::Error for LexError {}
