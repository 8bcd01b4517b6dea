use crate::{
    buffer::{Buffer, LineReader, LineSource},
    error::SchemeError,
    tokens::Token,
    value::Value,
};


type ParseResult<O> = Result<O, SchemeError>;

fn incomplete(error: SchemeError) -> SchemeError {
    match error {
        SchemeError::EndOfInput => SchemeError::Syntax("incomplete expression".to_owned()),
        other => other,
    }
}

fn atom(token: Token) -> Value {
    match token {
        Token::Integer(value) => Value::Integer(value),
        Token::Float(value) => Value::Float(value),
        Token::Boolean(value) => Value::Boolean(value),
        Token::Str(text) => Value::string(&text),
        Token::Symbol(name) if name == "nil" => Value::Nil,
        Token::Symbol(name) => Value::symbol(&name),
        delimiter => unreachable!("delimiter {} is not an atom", delimiter),
    }
}

/// Lists and quotations nested deeper than this are a syntax error.
pub const MAX_NESTING: usize = 512;

/// Reads the next complete expression from `buffer`.
///
/// Fails with [SchemeError::EndOfInput] if the buffer is exhausted before
/// the expression starts.
pub fn read<S: LineSource>(buffer: &mut Buffer<S>) -> ParseResult<Value> {
    read_nested(buffer, 0)
}

fn read_nested<S: LineSource>(buffer: &mut Buffer<S>, depth: usize) -> ParseResult<Value> {
    let token = match buffer.remove_front()? {
        Some(token) => token,
        None => return Err(SchemeError::EndOfInput),
    };

    match token {
        Token::LeftParen | Token::Quote if depth >= MAX_NESTING => {
            Err(SchemeError::Syntax("expression nested too deeply".to_owned()))
        }
        Token::LeftParen => read_tail(buffer, depth + 1),
        Token::Quote => {
            let quoted = read_nested(buffer, depth + 1).map_err(incomplete)?;
            Ok(Value::list([Value::symbol("quote"), quoted]))
        }
        token if !token.is_delimiter() => Ok(atom(token)),
        token => Err(SchemeError::Syntax(format!("unexpected token: {}", token))),
    }
}

/// Reads the rest of a list whose opening parenthesis was already consumed.
fn read_tail<S: LineSource>(buffer: &mut Buffer<S>, depth: usize) -> ParseResult<Value> {
    let mut items = vec![];

    loop {
        match buffer.current()? {
            None => return Err(SchemeError::Syntax("incomplete expression".to_owned())),
            Some(Token::RightParen) => {
                buffer.remove_front()?;
                return Ok(Value::list(items));
            }
            Some(Token::Dot) => {
                buffer.remove_front()?;
                let rest = read_nested(buffer, depth).map_err(incomplete)?;
                return match buffer.remove_front()? {
                    Some(Token::RightParen) => {
                        Ok(items.into_iter().rev().fold(rest, |rest, first| Value::cons(first, rest)))
                    }
                    None => Err(SchemeError::Syntax("incomplete expression".to_owned())),
                    Some(_) => Err(SchemeError::Syntax("invalid pair expression".to_owned())),
                };
            }
            Some(_) => items.push(read_nested(buffer, depth).map_err(incomplete)?),
        }
    }
}

/// Reads every expression in `input`, which may span several lines.
pub fn parse_all(input: &str) -> ParseResult<Vec<Value>> {
    let mut buffer = Buffer::new(LineReader::new(input.lines()));
    let mut expressions = vec![];

    loop {
        match read(&mut buffer) {
            Ok(expression) => expressions.push(expression),
            Err(SchemeError::EndOfInput) => return Ok(expressions),
            Err(error) => return Err(error),
        }
    }
}

/// Reads exactly one expression from `input`.
pub fn parse(input: &str) -> ParseResult<Value> {
    let mut expressions = parse_all(input)?;
    match expressions.len() {
        1 => Ok(expressions.remove(0)),
        0 => Err(SchemeError::Syntax("incomplete expression".to_owned())),
        _ => Err(SchemeError::Syntax(format!("unexpected expression: {}", expressions[1]))),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    fn round_trip(input: &str) -> anyhow::Result<String> {
        Ok(parse(input)?.to_string())
    }

    #[test]
    fn reads_atoms() -> anyhow::Result<()> {
        assert_eq!(parse("1")?, Value::Integer(1));
        assert_eq!(parse("true")?, Value::Boolean(true));
        assert_eq!(parse("nil")?, Value::Nil);
        assert_eq!(parse("()")?, Value::Nil);
        assert_eq!(parse("Foo")?, Value::symbol("foo"));
        assert_eq!(parse("\"hi\"")?, Value::string("hi"));

        Ok(())
    }

    #[test]
    fn reads_lists() -> anyhow::Result<()> {
        let expected = Value::list([Value::symbol("+"), Value::Integer(1), Value::Integer(2)]);
        assert_eq!(parse("(+ 1 2)")?, expected);
        assert_eq!(round_trip("(a (b c) () d)")?, "(a (b c) () d)");

        Ok(())
    }

    #[test]
    fn reads_dotted_pairs() -> anyhow::Result<()> {
        assert_eq!(parse("(1 . 2)")?, Value::cons(Value::Integer(1), Value::Integer(2)));
        assert_eq!(round_trip("(1 2 . 3)")?, "(1 2 . 3)");
        assert_eq!(round_trip("(1 . (2 3))")?, "(1 2 3)");

        Ok(())
    }

    #[test]
    fn quote_shorthand() -> anyhow::Result<()> {
        assert_eq!(round_trip("'x")?, "(quote x)");
        assert_eq!(round_trip("'(1 'b)")?, "(quote (1 (quote b)))");

        Ok(())
    }

    #[test]
    fn expressions_span_lines() -> anyhow::Result<()> {
        let expressions = parse_all("(+ 1\n   (- 23)\n   (* 4 2.5))  7")?;
        assert_eq!(expressions.len(), 2);
        assert_eq!(expressions[0].to_string(), "(+ 1 (- 23) (* 4 2.5))");
        assert_eq!(expressions[1], Value::Integer(7));

        Ok(())
    }

    #[test]
    fn syntax_errors() {
        let cases = [
            (")", "unexpected token: )"),
            (".", "unexpected token: ."),
            ("(1 2", "incomplete expression"),
            ("'", "incomplete expression"),
            ("(1 .", "incomplete expression"),
            ("(1 . 2 3)", "invalid pair expression"),
            ("(a ,@b)", "unexpected token: ,@"),
            ("1 2", "unexpected expression: 2"),
        ];

        for (input, message) in cases {
            assert_eq!(parse(input), Err(SchemeError::Syntax(message.to_owned())), "input {:?}", input);
        }
    }

    #[test]
    fn empty_input_is_end_of_input() -> anyhow::Result<()> {
        let mut buffer = Buffer::new(LineReader::new(["", "; only a comment"].into_iter()));
        match read(&mut buffer) {
            Err(SchemeError::EndOfInput) => Ok(()),
            other => bail!("expected end of input, got {:?}", other),
        }
    }

    #[test]
    fn atoms_survive_printing() -> anyhow::Result<()> {
        let atoms = [
            Value::Integer(-42),
            Value::Float(0.2),
            Value::Float(3.0),
            Value::Float(1e20),
            Value::Boolean(false),
            Value::symbol("list->vector"),
            Value::string("tab\there \"quoted\""),
            Value::Nil,
        ];

        for value in atoms {
            let printed = value.to_string();
            let read_back = parse(&printed)?;
            if read_back != value || read_back.type_name() != value.type_name() {
                bail!("{} read back as {:?}", printed, read_back);
            }
        }

        Ok(())
    }

    #[test]
    fn nesting_is_limited() -> anyhow::Result<()> {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let too_deep = Err(SchemeError::Syntax("expression nested too deeply".to_owned()));

        assert_eq!(parse(&nested(MAX_NESTING))?.to_string(), nested(MAX_NESTING));
        assert_eq!(parse(&nested(MAX_NESTING + 1)), too_deep);
        assert_eq!(parse(&nested(200_000)), too_deep);
        assert_eq!(parse(&format!("{}x", "'".repeat(200_000))), too_deep);

        Ok(())
    }

    #[test]
    fn long_lists_are_read() -> anyhow::Result<()> {
        let source = format!("({})", vec!["7"; 100_000].join(" "));
        let list = parse(&source)?;
        assert_eq!(list.len(), Ok(100_000));
        assert!(parse(&format!("({} . 8)", vec!["7"; 100_000].join(" ")))?.len().is_err());

        Ok(())
    }

    #[test]
    fn printed_strings_read_back() -> anyhow::Result<()> {
        let text = Value::string("a\u{1b}b\\c");
        assert_eq!(parse(&text.to_string())?, text);

        Ok(())
    }

    #[test]
    fn printing_reproduces_source() -> anyhow::Result<()> {
        for source in ["(define (f x) (if (> x 0) x (- x)))", "(quote (a \"b\" #t 2.5))", "(f)"] {
            assert_eq!(round_trip(source)?, source);
        }

        Ok(())
    }
}
