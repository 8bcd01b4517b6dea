use core::fmt;
use std::collections::VecDeque;

use itertools::Itertools;

use crate::{error::{LexError, SchemeError}, tokens::{tokenize_line, Token}};


/// Number of lines kept around for rendering a buffer in diagnostics.
const HISTORY: usize = 4;

/// Something that produces source lines one at a time.
pub trait LineSource {
    /// The next line, `Ok(None)` once the source is exhausted. Interactive
    /// sources may fail with a control signal such as an interrupt.
    fn next_line(&mut self) -> Result<Option<String>, SchemeError>;

    /// Called whenever a new top-level read starts on this source.
    fn begin_expression(&mut self) {}
}

impl<S: LineSource + ?Sized> LineSource for &mut S {
    fn next_line(&mut self) -> Result<Option<String>, SchemeError> {
        (**self).next_line()
    }

    fn begin_expression(&mut self) {
        (**self).begin_expression()
    }
}

/// A fixed sequence of lines, used for batch execution and file loading.
pub struct LineReader<I> {
    lines: I,
}

impl<I> LineReader<I> {
    pub fn new(lines: I) -> Self {
        Self { lines }
    }
}

impl<I, L> LineSource for LineReader<I>
where
    I: Iterator<Item = L>,
    L: Into<String>,
{
    fn next_line(&mut self) -> Result<Option<String>, SchemeError> {
        Ok(self.lines.next().map(Into::into))
    }
}

/// Token buffer over a line source. Lines are tokenized lazily, only when
/// the cursor runs off the end of the current one.
pub struct Buffer<S> {
    source: S,
    index: usize,
    line_number: usize,
    history: VecDeque<Vec<Token>>,
    current_line: Vec<Token>,
    errors: Vec<LexError>,
}

impl<S: LineSource> Buffer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            index: 0,
            line_number: 0,
            history: VecDeque::with_capacity(HISTORY),
            current_line: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Whether unconsumed tokens remain on the current line.
    pub fn more_on_line(&self) -> bool {
        self.index < self.current_line.len()
    }

    /// The token under the cursor, pulling lines until a non-empty one shows
    /// up. `Ok(None)` means the source is exhausted.
    pub fn current(&mut self) -> Result<Option<&Token>, SchemeError> {
        while !self.more_on_line() {
            let Some(line) = self.source.next_line()? else {
                return Ok(None);
            };

            let tokenized = tokenize_line(&line);
            self.errors.extend(tokenized.errors);
            self.push_line(tokenized.tokens);
        }

        Ok(self.current_line.get(self.index))
    }

    /// Returns the token under the cursor and advances past it.
    pub fn remove_front(&mut self) -> Result<Option<Token>, SchemeError> {
        let token = self.current()?.cloned();
        if token.is_some() {
            self.index += 1;
        }
        Ok(token)
    }

    /// Marks the start of a new top-level expression. Only has an effect on
    /// the source once the current line is used up.
    pub fn begin_expression(&mut self) {
        if !self.more_on_line() {
            self.source.begin_expression();
        }
    }

    /// Drops whatever is left of the current line.
    pub fn skip_line(&mut self) {
        self.index = self.current_line.len();
    }

    /// Lex errors collected from every line pulled so far.
    pub fn take_errors(&mut self) -> Vec<LexError> {
        std::mem::take(&mut self.errors)
    }

    fn push_line(&mut self, tokens: Vec<Token>) {
        let finished = std::mem::replace(&mut self.current_line, tokens);
        if self.line_number > 0 {
            if self.history.len() == HISTORY - 1 {
                self.history.pop_front();
            }
            self.history.push_back(finished);
        }
        self.line_number += 1;
        self.index = 0;
    }
}

fn join_tokens(tokens: &[Token]) -> String {
    tokens.iter().join(" ")
}

impl<S> fmt::Display for Buffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.line_number.max(1).to_string().len();
        let first = self.line_number.saturating_sub(self.history.len());

        for (offset, line) in self.history.iter().enumerate() {
            writeln!(f, "{:>width$}: {}", first + offset, join_tokens(line), width = width)?;
        }

        let consumed = join_tokens(&self.current_line[..self.index]);
        let remaining = join_tokens(&self.current_line[self.index..]);
        let current = format!("{} >> {}", consumed, remaining);
        write!(f, "{:>width$}: {}", self.line_number, current.trim(), width = width)
    }
}
