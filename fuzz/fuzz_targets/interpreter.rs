#![no_main]

use core::fmt;

use itertools::Itertools;
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};

// Primitives and variables
#[derive(Arbitrary, Debug)]
enum SchemeAtom {
    Add, Sub, Mul, Div,
    Quotient, Modulo, Remainder, Expt,
    True, False, Nil,
    Greater, GreaterEq,
    Less, LessEq, NumEq,
    EqP, EqualP,

    List, Car, Cdr, Length,
    Append, Map, Filter,
    Reduce, Apply, Eval,

    Identifier(String),
    Integer(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for SchemeAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            SchemeAtom::Add => "+",
            SchemeAtom::Sub => "-",
            SchemeAtom::Mul => "*",
            SchemeAtom::Div => "/",
            SchemeAtom::Quotient => "quotient",
            SchemeAtom::Modulo => "modulo",
            SchemeAtom::Remainder => "remainder",
            SchemeAtom::Expt => "expt",
            SchemeAtom::True => "#t",
            SchemeAtom::False => "#f",
            SchemeAtom::Nil => "nil",
            SchemeAtom::Greater => ">",
            SchemeAtom::GreaterEq => ">=",
            SchemeAtom::Less => "<",
            SchemeAtom::LessEq => "<=",
            SchemeAtom::NumEq => "=",
            SchemeAtom::EqP => "eq?",
            SchemeAtom::EqualP => "equal?",
            SchemeAtom::List => "list",
            SchemeAtom::Car => "car",
            SchemeAtom::Cdr => "cdr",
            SchemeAtom::Length => "length",
            SchemeAtom::Append => "append",
            SchemeAtom::Map => "map",
            SchemeAtom::Filter => "filter",
            SchemeAtom::Reduce => "reduce",
            SchemeAtom::Apply => "apply",
            SchemeAtom::Eval => "eval",
            SchemeAtom::Identifier(identifier) => identifier,
            SchemeAtom::Integer(value) => return write!(f, "{}", value),
            SchemeAtom::Float(value) => return write!(f, "{:?}", value),
            SchemeAtom::Str(text) => return write!(f, "{:?}", text),
        })
    }
}

#[derive(Arbitrary, Debug)]
enum SchemeCommand {
    Lambda(Vec<SchemeCommand>),
    Define(Vec<SchemeCommand>),
    If(Vec<SchemeCommand>),
    Cond(Vec<SchemeCommand>),
    And(Vec<SchemeCommand>),
    Or(Vec<SchemeCommand>),
    Not(Vec<SchemeCommand>),
    Cons(Vec<SchemeCommand>),
    Begin(Vec<SchemeCommand>),
    Let(Vec<SchemeCommand>),
    Quote(Box<SchemeCommand>),
    Call(Vec<SchemeCommand>),

    Atom(SchemeAtom),
}

fn stringify_arguments(values: &[SchemeCommand]) -> String {
    values.iter()
        .map(SchemeCommand::to_string)
        .join(" ")
}

impl fmt::Display for SchemeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (head, args) = match self {
            SchemeCommand::Atom(atom) => return atom.fmt(f),
            SchemeCommand::Quote(quoted) => return write!(f, "'{}", quoted),
            SchemeCommand::Call(args) => return write!(f, "({})", stringify_arguments(args)),
            SchemeCommand::Lambda(args) => ("lambda", args),
            SchemeCommand::Define(args) => ("define", args),
            SchemeCommand::If(args) => ("if", args),
            SchemeCommand::Cond(args) => ("cond", args),
            SchemeCommand::And(args) => ("and", args),
            SchemeCommand::Or(args) => ("or", args),
            SchemeCommand::Not(args) => ("not", args),
            SchemeCommand::Cons(args) => ("cons", args),
            SchemeCommand::Begin(args) => ("begin", args),
            SchemeCommand::Let(args) => ("let", args),
        };

        write!(f, "({} {})", head, stringify_arguments(args))
    }
}

fuzz_target!(|commands: Vec<SchemeCommand>| {
    let mut context = scm::EvaluationContext::new()
        .with_output(std::io::sink())
        .with_max_depth(500);

    for command in commands {
        let _ = context.evaluate_str(&command.to_string());
    }
});
