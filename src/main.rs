use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};

mod input;
mod lang;

use input::{EditorInput, IntSource, ReaderInput};
use lang::dot;
use lang::eval::{CallMode, Eval, EvalConfig};
use lang::parse::parse;
use lang::runtime::{DEFAULT_MEMORY_SIZE, DEFAULT_STACK_SIZE};

#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Program image to run
    image: PathBuf,

    /// Show debug output
    #[arg(short, long)]
    debug: bool,

    /// Trace every evaluated node (implies --debug)
    #[arg(long)]
    trace: bool,

    /// Print the symbol tables before running
    #[arg(short, long)]
    tables: bool,

    /// Write the syntax tree to stderr as a graphviz digraph
    #[arg(long)]
    dot: bool,

    /// Like --dot, with variable and function names in the labels
    #[arg(long)]
    verbose_dot: bool,

    /// Give every function invocation its own parameters and locals
    #[arg(long)]
    frames: bool,

    /// Number of memory cells
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    memory_size: usize,

    /// Number of operand stack slots
    #[arg(long, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: usize,

    /// Load the image but do not run it
    #[arg(long)]
    no_run: bool,
}

fn init_logging(debug: bool, trace: bool) -> Result<()> {
    let filter = if trace {
        LevelFilter::Trace
    } else if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };

    // Logs go to stderr so they never mix with program output
    match WriteLogger::init(filter, LogConfig::default(), io::stderr()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn init_input() -> Result<Box<dyn IntSource>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        Ok(Box::new(EditorInput::new()?))
    } else {
        Ok(Box::new(ReaderInput::new(stdin.lock())))
    }
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug, opts.trace)?;

    let text = fs::read_to_string(&opts.image)
        .with_context(|| format!("Failed to read {}", opts.image.display()))?;
    let mut program = parse(&text)
        .with_context(|| format!("Failed to load {}", opts.image.display()))?;
    info!(
        "Loaded {}: {} strings, {} variables, {} functions",
        opts.image.display(),
        program.tables.strings.len(),
        program.tables.variables.len(),
        program.tables.functions.len()
    );

    if opts.tables {
        println!("{}", program.tables);
    }

    if opts.dot || opts.verbose_dot {
        dot::render(
            &program.ast,
            &program.tables,
            opts.verbose_dot,
            &mut io::stderr(),
        )?;
    }

    if opts.no_run {
        return Ok(());
    }

    let config = EvalConfig {
        memory_size: opts.memory_size,
        stack_size: opts.stack_size,
        call_mode: if opts.frames {
            CallMode::Framed
        } else {
            CallMode::Shared
        },
    };

    let mut input = init_input()?;
    let mut sink = io::stdout();
    let mut eval = Eval::new(&mut program.tables, &mut sink, input.as_mut(), config);

    eval.run(&program.ast)
}
