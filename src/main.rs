mod interpreter;
mod loader;
mod program;
mod value;

use std::env::args;
use std::io::prelude::*;
use std::io::stdout;
use std::io::BufReader;

use anyhow::{Context, Result};

use interpreter::stock_interpreter;
use interpreter::Interpreter;
use program::{Program, Statement};
use value::Value;

fn main() -> Result<()> {
    env_logger::init();
    let args = args();
    if args.len() > 2 {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all("Usage: jsonscript [script]".as_bytes())
            .unwrap();
        std::process::exit(64);
    } else if args.len() == 2 {
        // Size is validated
        let path = args.skip(1).next().unwrap();
        let mut interpreter = stock_interpreter();
        let result = interpreter
            .run(&path)
            .with_context(|| format!("failed to run {}", path))?;
        if !matches!(result, Value::Nil) {
            println!("{}", result);
        }
    } else {
        run_prompt()?;
    }
    Ok(())
}

fn run_prompt() -> Result<()> {
    let stdin = std::io::stdin().lock();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();
    let mut interpreter = stock_interpreter();
    loop {
        {
            let mut stdout = stdout().lock();
            stdout.write_all("> ".as_bytes()).unwrap();
            stdout.flush()?;
        }
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        if !line.trim().is_empty() {
            match run_line(&mut interpreter, line.trim()) {
                Ok(Value::Nil) => {}
                Ok(value) => println!("{}", value),
                Err(e) => eprintln!("{}", e),
            }
        }
        // Don't keep appending code until the next time
        line.clear();
    }
    Ok(())
}

// A prompt line is either a single statement object or an array of statements
fn run_line(interpreter: &mut Interpreter, line: &str) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(line)?;
    if json.is_array() {
        let program = Program::from_json(&json)?;
        Ok(interpreter.interpret(&program)?)
    } else {
        let statement = Statement::from_json(&json)?;
        Ok(interpreter.interpret_one(&statement)?)
    }
}
