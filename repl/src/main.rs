use anyhow::Result;
use kol::{Session, Value};
use rustyline::{error::ReadlineError, DefaultEditor};
use tracing_subscriber::EnvFilter;

const HISTORY_FILE: &str = "history.txt";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    println!(
        r"
Welcome to the Kol programming language REPL!
You may type Kol code below for evaluation.
Enter 'exit' or press 'CTRL+C' to exit the REPL.
    "
    );

    let mut rl = DefaultEditor::new()?;
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    let mut session = Session::new();

    loop {
        match rl.readline("> ") {
            Ok(line) => match line.trim() {
                "exit" => break,
                "" => continue,
                input => {
                    rl.add_history_entry(input)?;
                    match session.evaluate(input) {
                        Ok(Value::Void) => {}
                        Ok(value) => println!("{}", value),
                        Err(error) => eprintln!("{}", error),
                    }
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => {
                println!("Error: {:?}", error);
                break;
            }
        }
    }

    rl.save_history(HISTORY_FILE)?;
    Ok(())
}
