use std::collections::HashMap;

use super::runtime::{string_arg, Interpreter, RuntimeError};
use crate::program::Args;
use crate::value::Value;

/// A native operation. Builtins mutate the interpreter they are handed (the
/// variable store, or the loader through `import`) but carry no state of
/// their own. `Some` results land in the caller's return register.
pub type BuiltinFn = fn(&mut Interpreter, &Args) -> Result<Option<Value>, RuntimeError>;

fn set_value(interpreter: &mut Interpreter, args: &Args) -> Result<Option<Value>, RuntimeError> {
    let name = string_arg(args, "set", "name")?.to_owned();
    let value = args
        .get("value")
        .ok_or(RuntimeError::MissingArgument("set", "value"))?;
    let value = interpreter.process_value(value, args)?;
    interpreter.set_variable(&name, value);
    Ok(None)
}

fn return_value(interpreter: &mut Interpreter, args: &Args) -> Result<Option<Value>, RuntimeError> {
    let value = args
        .get("return_value")
        .ok_or(RuntimeError::MissingArgument("return", "return_value"))?;
    Ok(Some(interpreter.process_value(value, args)?))
}

fn import_program(
    interpreter: &mut Interpreter,
    args: &Args,
) -> Result<Option<Value>, RuntimeError> {
    let path = string_arg(args, "import", "path")?.to_owned();
    interpreter.import(&path)
}

fn operands(
    interpreter: &mut Interpreter,
    operation: &'static str,
    args: &Args,
) -> Result<(Value, Value), RuntimeError> {
    let left = args
        .get("left")
        .ok_or(RuntimeError::MissingArgument(operation, "left"))?;
    let right = args
        .get("right")
        .ok_or(RuntimeError::MissingArgument(operation, "right"))?;
    let left = interpreter.process_value(left, args)?;
    let right = interpreter.process_value(right, args)?;
    Ok((left, right))
}

fn add(interpreter: &mut Interpreter, args: &Args) -> Result<Option<Value>, RuntimeError> {
    let (left, right) = operands(interpreter, "add", args)?;
    Ok(Some((left + right)?))
}

fn subtract(interpreter: &mut Interpreter, args: &Args) -> Result<Option<Value>, RuntimeError> {
    let (left, right) = operands(interpreter, "subtract", args)?;
    Ok(Some((left - right)?))
}

fn multiply(interpreter: &mut Interpreter, args: &Args) -> Result<Option<Value>, RuntimeError> {
    let (left, right) = operands(interpreter, "multiply", args)?;
    Ok(Some((left * right)?))
}

fn divide(interpreter: &mut Interpreter, args: &Args) -> Result<Option<Value>, RuntimeError> {
    let (left, right) = operands(interpreter, "divide", args)?;
    Ok(Some((left / right)?))
}

/// The fixed builtin table, built once per interpreter. The dispatcher
/// consults it only after the method table, so any of these names can be
/// shadowed by a user definition.
pub fn builtin_table() -> HashMap<&'static str, BuiltinFn> {
    let mut table = HashMap::new();
    table.insert("set", set_value as BuiltinFn);
    table.insert("return", return_value as BuiltinFn);
    table.insert("import", import_program as BuiltinFn);
    table.insert("add", add as BuiltinFn);
    table.insert("subtract", subtract as BuiltinFn);
    table.insert("multiply", multiply as BuiltinFn);
    table.insert("divide", divide as BuiltinFn);
    table
}
