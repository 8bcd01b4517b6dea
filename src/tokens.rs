use core::fmt::{self, Write as _};

use logos::{Lexer, Logos};

use crate::error::LexError;


// First pass: split a line into delimiters, strings and bare words. Words
// are classified afterwards so that a bad word can be reported and dropped
// without losing the rest of the line.
#[derive(Debug, Logos)]
#[logos(skip r"([ \t\r\n\f]+|;[^\n]*)")]
enum RawToken<'a> {
    #[token("(")]
    #[token("[")]
    LeftParen,

    #[token(")")]
    #[token("]")]
    RightParen,

    #[token("'")]
    Quote,

    #[token("`")]
    Quasiquote,

    #[token(",")]
    Unquote,

    #[token(",@")]
    UnquoteSplicing,

    #[token("\"", lex_string)]
    Str(String),

    #[regex(r#"[^ \t\r\n\f()\[\]'`,;"]+"#, |lex| lex.slice())]
    Word(&'a str),
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

/// Prints a string as a literal the tokenizer reads back unchanged. Only
/// the characters `unescape` knows about are escaped.
pub(crate) struct Escaped<'a>(pub &'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                '\0' => f.write_str("\\0")?,
                other => f.write_char(other)?,
            }
        }
        f.write_char('"')
    }
}

// Scans the body of a string literal after its opening quote. An
// unterminated literal swallows the rest of the line and is an error.
fn lex_string<'a>(lex: &mut Lexer<'a, RawToken<'a>>) -> Option<String> {
    let mut value = String::new();
    let mut chars = lex.remainder().char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => {
                lex.bump(offset + 1);
                return Some(value);
            }
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(unescape(escaped)),
                None => break,
            },
            c => value.push(c),
        }
    }

    lex.bump(lex.remainder().len());
    None
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Symbol(String),
    Str(String),
    LeftParen,
    RightParen,
    Quote,
    Dot,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
}

impl Token {
    /// Delimiters never stand for a datum on their own.
    pub fn is_delimiter(&self) -> bool {
        matches!(
            self,
            Self::LeftParen
                | Self::RightParen
                | Self::Quote
                | Self::Dot
                | Self::Quasiquote
                | Self::Unquote
                | Self::UnquoteSplicing
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Boolean(true) => write!(f, "#t"),
            Self::Boolean(false) => write!(f, "#f"),
            Self::Symbol(name) => write!(f, "{}", name),
            Self::Str(text) => write!(f, "{}", Escaped(text)),
            Self::LeftParen => write!(f, "("),
            Self::RightParen => write!(f, ")"),
            Self::Quote => write!(f, "'"),
            Self::Dot => write!(f, "."),
            Self::Quasiquote => write!(f, "`"),
            Self::Unquote => write!(f, ","),
            Self::UnquoteSplicing => write!(f, ",@"),
        }
    }
}

const SYMBOL_PUNCTUATION: &str = "!$%&*/:<=>?@^_~+-.";

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_PUNCTUATION.contains(c)
}

fn starts_numeral(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit() || "+-.".contains(c))
}

fn classify_word(word: &str) -> Option<Token> {
    if word == "." {
        return Some(Token::Dot);
    }

    let lowered = word.to_ascii_lowercase();
    match lowered.as_str() {
        "#t" | "true" => return Some(Token::Boolean(true)),
        "#f" | "false" => return Some(Token::Boolean(false)),
        _ => {}
    }

    if starts_numeral(word) {
        if let Ok(integer) = word.parse::<i64>() {
            return Some(Token::Integer(integer));
        }
        match word.parse::<f64>() {
            Ok(float) if float.is_finite() => return Some(Token::Float(float)),
            _ => {}
        }
    }

    if word.chars().all(is_symbol_char) {
        return Some(Token::Symbol(lowered));
    }

    None
}

/// The tokens of one line together with the malformed tokens that were
/// dropped from it.
#[derive(Debug, Default)]
pub struct TokenizedLine {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Splits one line of source text into tokens. Comments and whitespace are
/// discarded; malformed tokens are reported in [TokenizedLine::errors].
pub fn tokenize_line(line: &str) -> TokenizedLine {
    let mut result = TokenizedLine::default();
    let mut lexer = RawToken::lexer(line);

    while let Some(raw) = lexer.next() {
        let token = match raw {
            Ok(RawToken::LeftParen) => Some(Token::LeftParen),
            Ok(RawToken::RightParen) => Some(Token::RightParen),
            Ok(RawToken::Quote) => Some(Token::Quote),
            Ok(RawToken::Quasiquote) => Some(Token::Quasiquote),
            Ok(RawToken::Unquote) => Some(Token::Unquote),
            Ok(RawToken::UnquoteSplicing) => Some(Token::UnquoteSplicing),
            Ok(RawToken::Str(text)) => Some(Token::Str(text)),
            Ok(RawToken::Word(word)) => classify_word(word),
            Err(()) => None,
        };

        match token {
            Some(token) => result.tokens.push(token),
            None => {
                let span = lexer.span();
                result.errors.push(LexError {
                    text: line[span.clone()].to_owned(),
                    column: line[..span.start].chars().count(),
                    line: line.to_owned(),
                });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<Token> {
        tokenize_line(line).tokens
    }

    fn symbol(name: &str) -> Token {
        Token::Symbol(name.to_owned())
    }

    #[test]
    fn tokenizes_a_call() {
        assert_eq!(
            tokens("(+ 1 2.5)"),
            vec![Token::LeftParen, symbol("+"), Token::Integer(1), Token::Float(2.5), Token::RightParen]
        );
    }

    #[test]
    fn numerals_fall_back_to_symbols() {
        assert_eq!(tokens("-7"), vec![Token::Integer(-7)]);
        assert_eq!(tokens("+3"), vec![Token::Integer(3)]);
        assert_eq!(tokens(".5"), vec![Token::Float(0.5)]);
        assert_eq!(tokens("-"), vec![symbol("-")]);
        assert_eq!(tokens("..."), vec![symbol("...")]);
        assert_eq!(tokens("1+"), vec![symbol("1+")]);
        assert_eq!(tokens("+inf"), vec![symbol("+inf")]);
    }

    #[test]
    fn integer_overflow_becomes_float() {
        assert_eq!(tokens("99999999999999999999"), vec![Token::Float(99999999999999999999.0)]);
    }

    #[test]
    fn booleans_are_case_insensitive() {
        assert_eq!(
            tokens("#t #F true FALSE"),
            vec![Token::Boolean(true), Token::Boolean(false), Token::Boolean(true), Token::Boolean(false)]
        );
    }

    #[test]
    fn symbols_are_lowercased() {
        assert_eq!(tokens("Hello-World?"), vec![symbol("hello-world?")]);
    }

    #[test]
    fn delimiters() {
        assert_eq!(
            tokens("'(a . b) ,@c `d ,e"),
            vec![
                Token::Quote, Token::LeftParen, symbol("a"), Token::Dot, symbol("b"), Token::RightParen,
                Token::UnquoteSplicing, symbol("c"), Token::Quasiquote, symbol("d"), Token::Unquote, symbol("e"),
            ]
        );
        assert_eq!(tokens("[x]"), vec![Token::LeftParen, symbol("x"), Token::RightParen]);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(tokens("1 ; two (three"), vec![Token::Integer(1)]);
        assert_eq!(tokens("; nothing"), vec![]);
    }

    #[test]
    fn strings_honour_escapes() {
        assert_eq!(
            tokens(r#"(display "say \"hi\"\n")"#),
            vec![Token::LeftParen, symbol("display"), Token::Str("say \"hi\"\n".to_owned()), Token::RightParen]
        );
        assert_eq!(tokens(r#""""#), vec![Token::Str(String::new())]);
        assert_eq!(tokens(r#""a;b""#), vec![Token::Str("a;b".to_owned())]);
    }

    #[test]
    fn printed_strings_read_back() {
        for text in ["a\u{1b}b", "back\\slash", "nul\0 cr\r tab\t", "é \u{7f} \u{200b}"] {
            let printed = Token::Str(text.to_owned()).to_string();
            assert_eq!(tokens(&printed), vec![Token::Str(text.to_owned())], "printed as {}", printed);
        }
        assert_eq!(Escaped("a\u{1b}b").to_string(), "\"a\u{1b}b\"");
    }

    #[test]
    fn malformed_tokens_are_dropped_and_reported() {
        let line = tokenize_line("(foo #x bar)");
        assert_eq!(line.tokens, vec![Token::LeftParen, symbol("foo"), symbol("bar"), Token::RightParen]);
        assert_eq!(line.errors.len(), 1);
        assert_eq!(line.errors[0].text, "#x");
        assert_eq!(line.errors[0].column, 5);
    }

    #[test]
    fn unterminated_string_is_reported() {
        let line = tokenize_line(r#"(display "oops"#);
        assert_eq!(line.tokens, vec![Token::LeftParen, symbol("display")]);
        assert_eq!(line.errors.len(), 1);
        assert_eq!(line.errors[0].text, "\"oops");
    }

    #[test]
    fn tokens_print_as_source() {
        let printed = tokens("(a 1 2.5 #t \"s\" . ')")
            .iter()
            .map(Token::to_string)
            .collect::<Vec<_>>();
        assert_eq!(printed, vec!["(", "a", "1", "2.5", "#t", "\"s\"", ".", "'", ")"]);
    }
}
