use std::{path::PathBuf, sync::atomic::Ordering, thread};

use anyhow::bail;
use clap::Parser;
use scm::{load_file, read_eval_print_loop, EvaluationContext, InputReader, SchemeError};

/// Deep recursion in the evaluator maps onto the native stack.
const STACK_SIZE: usize = 256 * 1024 * 1024;

/// A small Scheme interpreter.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Source file to run
    file: Option<PathBuf>,

    /// Load FILE quietly, then start an interactive session
    #[arg(short = 'i', long = "load", requires = "file")]
    load: bool,

    /// Evaluation depth at which runaway recursion is reported
    #[arg(long, default_value_t = 10_000)]
    max_depth: usize,
}

fn run(args: Args) -> Result<(), SchemeError> {
    let mut ctx = EvaluationContext::new().with_max_depth(args.max_depth);
    let global = ctx.global().clone();

    // Ctrl-C while evaluating aborts the running top-level expression
    let interrupt = ctx.interrupt_handle();
    ctrlc::set_handler(move || interrupt.store(true, Ordering::Relaxed))
        .map_err(|error| SchemeError::Io(error.to_string()))?;

    if let Some(file) = &args.file {
        load_file(file, args.load, &global, &mut ctx)?;
        if !args.load {
            return Ok(());
        }
    }

    read_eval_print_loop(InputReader::new()?, &global, &mut ctx, false)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let interpreter = thread::Builder::new()
        .name("scm".to_owned())
        .stack_size(STACK_SIZE)
        .spawn(move || run(args))?;

    match interpreter.join() {
        Ok(Ok(())) | Ok(Err(SchemeError::Exit)) => Ok(()),
        Ok(Err(error)) => Err(error.into()),
        Err(_) => bail!("interpreter thread panicked"),
    }
}
