mod builtin;
mod runtime;

pub use runtime::{Interpreter, RuntimeError};

use crate::loader::FetchLoader;

/// An interpreter wired to the stock file/HTTP program loader.
pub fn stock_interpreter() -> Interpreter {
    Interpreter::new(Box::new(FetchLoader))
}
