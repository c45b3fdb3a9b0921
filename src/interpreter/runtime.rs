use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use thiserror::Error;

use super::builtin::{builtin_table, BuiltinFn};
use crate::loader::{LoadError, SourceLoader};
use crate::program::{Args, Program, Statement};
use crate::value::Value;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("divide by zero")]
    DivideByZero,
    #[error("type error: {0}")]
    TypeError(&'static str),
    #[error("no parameter named {0}")]
    UnknownParameter(String),
    #[error("{0} requires a {1} argument")]
    MissingArgument(&'static str, &'static str),
    #[error("{0} requires {1} to be a string")]
    ArgumentNotAString(&'static str, &'static str),
    #[error("method {0} must be defined with an array of statements")]
    MalformedMethod(String),
    #[error("import failed: {0}")]
    Import(#[from] LoadError),
}

/// The engine: a variable store and a method table that live as long as the
/// instance, a fixed builtin table, and the loader `import` delegates to.
/// One instance is meant to be driven by one logical thread of control;
/// independent instances share nothing.
pub struct Interpreter {
    variables: HashMap<String, Value>,
    methods: HashMap<String, Rc<Vec<Statement>>>,
    builtins: HashMap<&'static str, BuiltinFn>,
    loader: Box<dyn SourceLoader>,
}

impl Interpreter {
    pub fn new(loader: Box<dyn SourceLoader>) -> Interpreter {
        Interpreter {
            variables: HashMap::new(),
            methods: HashMap::new(),
            builtins: builtin_table(),
            loader,
        }
    }

    /// Loads the program at `path` through this interpreter's loader and
    /// runs it.
    pub fn run(&mut self, path: &str) -> Result<Value, RuntimeError> {
        let program = self.loader.load(path)?;
        self.interpret(&program)
    }

    pub fn interpret(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        Ok(self.execute(&program.0, &Args::new())?.unwrap_or(Value::Nil))
    }

    pub fn interpret_one(&mut self, statement: &Statement) -> Result<Value, RuntimeError> {
        Ok(self
            .execute(std::slice::from_ref(statement), &Args::new())?
            .unwrap_or(Value::Nil))
    }

    /// Read access to the variable store, for hosts inspecting final state.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub(crate) fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_owned(), value);
    }

    pub(crate) fn import(&mut self, path: &str) -> Result<Option<Value>, RuntimeError> {
        let program = self.loader.load(path)?;
        self.execute(&program.0, &Args::new())
    }

    /// Runs a statement sequence in order. `parameters` is this call's
    /// parameter mapping. The returned value is the call's return register:
    /// `Some` once any statement has produced a result, with later results
    /// overwriting earlier ones.
    pub fn execute(
        &mut self,
        statements: &[Statement],
        parameters: &Args,
    ) -> Result<Option<Value>, RuntimeError> {
        let mut register = None;
        for statement in statements {
            let args = self.propagate_parameters(statement, parameters);
            match statement.operation.as_str() {
                "define" => {
                    let name = string_arg(&args, "define", "name")?.to_owned();
                    let code = args
                        .get("code")
                        .ok_or(RuntimeError::MissingArgument("define", "code"))?;
                    let body = method_body(&name, code)?;
                    // Redefinition overwrites; entries are never removed.
                    self.methods.insert(name, Rc::new(body));
                }
                "get" => {
                    let name = string_arg(&args, "get", "name")?;
                    register =
                        Some(self.variables.get(name).cloned().unwrap_or(Value::Nil));
                }
                "getarg" => {
                    let name = string_arg(&args, "getarg", "name")?;
                    let value = parameters
                        .get(name)
                        .cloned()
                        .ok_or_else(|| RuntimeError::UnknownParameter(name.to_owned()))?;
                    register = Some(value);
                }
                operation => {
                    // The method table is probed before the builtin table, so
                    // a user-defined method shadows a builtin of the same name.
                    if let Some(body) = self.methods.get(operation).cloned() {
                        if let Some(value) = self.execute(&body, &args)? {
                            register = Some(value);
                        }
                    } else if let Some(builtin) = self.builtins.get(operation).copied() {
                        if let Some(value) = builtin(self, &args)? {
                            register = Some(value);
                        }
                    } else {
                        debug!("skipping unknown operation {}", operation);
                    }
                }
            }
        }
        Ok(register)
    }

    /// Evaluates `value` if it is a statement, otherwise returns it as-is.
    /// A statement in value position runs as a one-statement program under
    /// the current parameters and yields its register value. This is the
    /// whole expression-nesting mechanism.
    pub fn process_value(
        &mut self,
        value: &Value,
        parameters: &Args,
    ) -> Result<Value, RuntimeError> {
        match value {
            Value::Statement(statement) => Ok(self
                .execute(std::slice::from_ref(statement.as_ref()), parameters)?
                .unwrap_or(Value::Nil)),
            literal => Ok(literal.clone()),
        }
    }

    // An explicit arg or an existing global of the same name wins over an
    // injected parameter. Note that presence in the variable store suppresses
    // injection even when the global is unrelated to the parameter.
    fn propagate_parameters(&self, statement: &Statement, parameters: &Args) -> Args {
        let mut args = statement.args.clone();
        for (key, value) in parameters {
            if !args.contains_key(key) && !self.variables.contains_key(key) {
                args.insert(key.clone(), value.clone());
            }
        }
        args
    }
}

pub(crate) fn string_arg<'a>(
    args: &'a Args,
    operation: &'static str,
    key: &'static str,
) -> Result<&'a str, RuntimeError> {
    match args.get(key) {
        Some(value) => value
            .as_str()
            .ok_or(RuntimeError::ArgumentNotAString(operation, key)),
        None => Err(RuntimeError::MissingArgument(operation, key)),
    }
}

fn method_body(name: &str, code: &Value) -> Result<Vec<Statement>, RuntimeError> {
    let Value::Array(items) = code else {
        return Err(RuntimeError::MalformedMethod(name.to_owned()));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Statement(statement) => Ok(statement.as_ref().clone()),
            _ => Err(RuntimeError::MalformedMethod(name.to_owned())),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    /// In-memory loader so import tests never touch the filesystem.
    struct TableLoader(HashMap<&'static str, serde_json::Value>);

    impl SourceLoader for TableLoader {
        fn load(&self, path: &str) -> Result<Program, LoadError> {
            let json = self.0.get(path).unwrap();
            Ok(Program::from_json(json).unwrap())
        }
    }

    fn interpreter() -> Interpreter {
        Interpreter::new(Box::new(TableLoader(HashMap::new())))
    }

    fn run(interpreter: &mut Interpreter, json: serde_json::Value) -> Result<Value, RuntimeError> {
        let program = Program::from_json(&json).unwrap();
        interpreter.interpret(&program)
    }

    #[test]
    fn literal_values_pass_through() {
        let mut interpreter = interpreter();
        for value in [Value::Nil, Value::Number(3.0), Value::string("x")] {
            let result = interpreter.process_value(&value, &Args::new()).unwrap();
            assert_eq!(value, result);
        }
    }

    #[test]
    fn set_then_get() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "set", "args": {"name": "greeting", "value": "hello"}},
                {"operation": "get", "args": {"name": "greeting"}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::string("hello"), result);
        assert_eq!(Some(&Value::string("hello")), interpreter.variable("greeting"));
    }

    #[test]
    fn get_of_unset_variable_is_nil() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([{"operation": "get", "args": {"name": "ghost"}}]),
        )
        .unwrap();
        assert_eq!(Value::Nil, result);
    }

    #[test]
    fn arithmetic_builtins() {
        let mut interpreter = interpreter();
        let cases = [
            ("add", 2.0, 3.0, 5.0),
            ("subtract", 5.0, 2.0, 3.0),
            ("multiply", 4.0, 3.0, 12.0),
            ("divide", 6.0, 3.0, 2.0),
        ];
        for (operation, left, right, expected) in cases {
            let result = run(
                &mut interpreter,
                json!([{"operation": operation, "args": {"left": left, "right": right}}]),
            )
            .unwrap();
            assert_eq!(Value::Number(expected), result, "{}", operation);
        }
    }

    #[test]
    fn divide_by_zero_aborts() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([{"operation": "divide", "args": {"left": 1, "right": 0}}]),
        );
        assert!(matches!(result, Err(RuntimeError::DivideByZero)));
    }

    #[test]
    fn return_produces_a_value() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([{"operation": "return", "args": {"return_value": 9}}]),
        )
        .unwrap();
        assert_eq!(Value::Number(9.0), result);
    }

    #[test]
    fn nested_expression() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "set", "args": {"name": "r", "value":
                    {"operation": "add", "args": {"left": 1, "right":
                        {"operation": "multiply", "args": {"left": 2, "right": 3}}}}}},
                {"operation": "get", "args": {"name": "r"}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::Number(7.0), result);
    }

    #[test]
    fn define_and_invoke_with_parameters() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "define", "args": {"name": "echo", "code": [
                    {"operation": "getarg", "args": {"name": "x"}},
                ]}},
                {"operation": "echo", "args": {"x": 42}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::Number(42.0), result);
    }

    #[test]
    fn redefine_replaces_the_body() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "define", "args": {"name": "answer", "code": [
                    {"operation": "return", "args": {"return_value": 1}},
                ]}},
                {"operation": "define", "args": {"name": "answer", "code": [
                    {"operation": "return", "args": {"return_value": 2}},
                ]}},
                {"operation": "answer"},
            ]),
        )
        .unwrap();
        assert_eq!(Value::Number(2.0), result);
    }

    #[test]
    fn redefinition_mid_invocation_finishes_the_running_body() {
        // A method that redefines itself keeps executing its old body; the
        // replacement only takes effect for subsequent invocations.
        let mut interpreter = interpreter();
        let first = run(
            &mut interpreter,
            json!([
                {"operation": "define", "args": {"name": "swap", "code": [
                    {"operation": "define", "args": {"name": "swap", "code": [
                        {"operation": "return", "args": {"return_value": "new"}},
                    ]}},
                    {"operation": "return", "args": {"return_value": "old"}},
                ]}},
                {"operation": "swap"},
            ]),
        )
        .unwrap();
        assert_eq!(Value::string("old"), first);
        let second = run(&mut interpreter, json!([{"operation": "swap"}])).unwrap();
        assert_eq!(Value::string("new"), second);
    }

    #[test]
    fn non_string_argument_error_names_the_key() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([{"operation": "import", "args": {"path": 3}}]),
        );
        match result {
            Err(error) => assert_eq!("import requires path to be a string", error.to_string()),
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[test]
    fn user_method_shadows_builtin() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "define", "args": {"name": "add", "code": [
                    {"operation": "return", "args": {"return_value": "shadowed"}},
                ]}},
                {"operation": "add", "args": {"left": 2, "right": 3}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::string("shadowed"), result);
    }

    #[test]
    fn getarg_without_parameter_fails() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([{"operation": "getarg", "args": {"name": "missing"}}]),
        );
        match result {
            Err(RuntimeError::UnknownParameter(name)) => assert_eq!("missing", name),
            other => panic!("expected an unknown parameter error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_operation_is_skipped() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "frobnicate", "args": {"left": 1}},
                {"operation": "return", "args": {"return_value": "still here"}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::string("still here"), result);
    }

    #[test]
    fn parameters_propagate_into_nested_calls() {
        // The inner method never receives x explicitly; it flows through the
        // outer call's args into the unqualified inner statement.
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "define", "args": {"name": "inner", "code": [
                    {"operation": "getarg", "args": {"name": "x"}},
                ]}},
                {"operation": "define", "args": {"name": "outer", "code": [
                    {"operation": "inner", "args": {}},
                ]}},
                {"operation": "outer", "args": {"x": 5}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::Number(5.0), result);
    }

    #[test]
    fn global_of_the_same_name_suppresses_propagation() {
        // Quirk preserved from the reference semantics: a variable store
        // entry blocks injection even though getarg never reads the store.
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "set", "args": {"name": "x", "value": 99}},
                {"operation": "define", "args": {"name": "inner", "code": [
                    {"operation": "getarg", "args": {"name": "x"}},
                ]}},
                {"operation": "define", "args": {"name": "outer", "code": [
                    {"operation": "inner", "args": {}},
                ]}},
                {"operation": "outer", "args": {"x": 5}},
            ]),
        );
        assert!(matches!(result, Err(RuntimeError::UnknownParameter(_))));
    }

    #[test]
    fn explicit_arg_wins_over_propagated_parameter() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "define", "args": {"name": "inner", "code": [
                    {"operation": "getarg", "args": {"name": "x"}},
                ]}},
                {"operation": "define", "args": {"name": "outer", "code": [
                    {"operation": "inner", "args": {"x": 7}},
                ]}},
                {"operation": "outer", "args": {"x": 5}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::Number(7.0), result);
    }

    #[test]
    fn import_shares_variables_and_methods() {
        let mut library = HashMap::new();
        library.insert(
            "lib.json",
            json!([
                {"operation": "set", "args": {"name": "base", "value": 10}},
                {"operation": "define", "args": {"name": "above_base", "code": [
                    {"operation": "add", "args": {"left":
                        {"operation": "get", "args": {"name": "base"}},
                        "right": {"operation": "getarg", "args": {"name": "by"}}}},
                ]}},
            ]),
        );
        let mut interpreter = Interpreter::new(Box::new(TableLoader(library)));
        let result = run(
            &mut interpreter,
            json!([
                {"operation": "import", "args": {"path": "lib.json"}},
                {"operation": "above_base", "args": {"by": 4}},
            ]),
        )
        .unwrap();
        assert_eq!(Value::Number(14.0), result);
        assert_eq!(Some(&Value::Number(10.0)), interpreter.variable("base"));
    }

    #[test]
    fn imported_program_result_reaches_the_importer() {
        let mut library = HashMap::new();
        library.insert(
            "answer.json",
            json!([{"operation": "return", "args": {"return_value": 41}}]),
        );
        let mut interpreter = Interpreter::new(Box::new(TableLoader(library)));
        let result = run(
            &mut interpreter,
            json!([{"operation": "import", "args": {"path": "answer.json"}}]),
        )
        .unwrap();
        assert_eq!(Value::Number(41.0), result);
    }

    #[test]
    fn define_with_non_array_code_fails() {
        let mut interpreter = interpreter();
        let result = run(
            &mut interpreter,
            json!([{"operation": "define", "args": {"name": "bad", "code": 5}}]),
        );
        assert!(matches!(result, Err(RuntimeError::MalformedMethod(_))));
    }
}
