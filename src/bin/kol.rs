use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use kol::{Compiler, Lexer, Limits, Parser as KolParser, Value, VirtualMachine};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kol")]
#[command(about = "The Kol programming language")]
struct Cli {
    file: PathBuf,

    /// Print the compiled bytecode before running it
    #[arg(long)]
    disassemble: bool,

    #[arg(long, default_value_t = Limits::default().stack_size)]
    stack_size: usize,

    #[arg(long, default_value_t = Limits::default().max_frames)]
    max_frames: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read file: {}", cli.file.display()))?;

    let mut lexer = Lexer::new(&source);
    let tokens = lexer.tokenize().context("Lexer error")?;

    let mut parser = KolParser::new(&tokens);
    let statements = parser.parse().context("Parser error")?;

    let mut compiler = Compiler::new();
    compiler.compile(&statements).context("Compiler error")?;
    let bytecode = compiler.bytecode();

    if cli.disassemble {
        println!("{}", bytecode.instructions);
        for (index, constant) in bytecode.constants.iter().enumerate() {
            match constant {
                Value::Function(function) => {
                    println!("\nconstant {}: function", index);
                    println!("{}", function.instructions);
                }
                other => println!("constant {}: {}", index, other),
            }
        }
        println!();
    }

    let limits = Limits {
        stack_size: cli.stack_size,
        max_frames: cli.max_frames,
    };
    let mut vm = VirtualMachine::new(bytecode).with_limits(limits);
    vm.run().context("Runtime error")?;

    Ok(())
}
