use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::value::Value;

/// The argument mapping attached to a statement, and also the parameter
/// mapping threaded through a call.
pub type Args = HashMap<String, Value>;

/// One instruction: an operation name plus its arguments. The operation
/// resolves to a user-defined method, a builtin, or a control pseudo-op.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub operation: String,
    pub args: Args,
}

/// An ordered sequence of statements, executed top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Program(pub Vec<Statement>);

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("a program must be a JSON array of statements")]
    NotAProgram,
    #[error("a statement must be a JSON object")]
    NotAStatement,
    #[error("statement is missing its \"operation\" key")]
    MissingOperation,
    #[error("\"operation\" must be a string")]
    OperationNotAString,
    #[error("\"args\" must be a JSON object")]
    ArgsNotAnObject,
}

impl Program {
    pub fn from_json(json: &serde_json::Value) -> Result<Program, DecodeError> {
        let statements = json.as_array().ok_or(DecodeError::NotAProgram)?;
        statements
            .iter()
            .map(Statement::from_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Program)
    }
}

impl Statement {
    pub fn from_json(json: &serde_json::Value) -> Result<Statement, DecodeError> {
        let fields = json.as_object().ok_or(DecodeError::NotAStatement)?;
        let operation = fields
            .get("operation")
            .ok_or(DecodeError::MissingOperation)?
            .as_str()
            .ok_or(DecodeError::OperationNotAString)?
            .to_owned();
        let args = match fields.get("args") {
            None => Args::new(),
            Some(args) => {
                let fields = args.as_object().ok_or(DecodeError::ArgsNotAnObject)?;
                fields
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
                    .collect::<Result<Args, _>>()?
            }
        };
        Ok(Statement { operation, args })
    }
}

/// Decodes a JSON tree into a runtime value. An object carrying an
/// "operation" key becomes a statement to be evaluated in value position;
/// any other object is a literal mapping.
pub fn decode_value(json: &serde_json::Value) -> Result<Value, DecodeError> {
    use serde_json::Value as Json;
    Ok(match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::String(Rc::new(s.clone())),
        Json::Array(items) => Value::Array(Rc::new(
            items
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Json::Object(fields) => {
            if fields.contains_key("operation") {
                Value::Statement(Rc::new(Statement::from_json(json)?))
            } else {
                Value::Object(Rc::new(
                    fields
                        .iter()
                        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
                        .collect::<Result<HashMap<_, _>, _>>()?,
                ))
            }
        }
    })
}
