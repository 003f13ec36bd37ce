//! Component markup language.
//!
//! Templates are written in a TSX subset. They are parsed ahead of time into
//! an AST and run by a small interpreter; nothing is compiled to host code.
//!
//! ```text
//! source ──► parser ──► Program ──► ModuleLoader ──► Module ──► Interp ──► Node
//! ```

mod ast;
mod builtins;
mod date;
mod interp;
mod module;
mod parser;
mod value;

pub use ast::JsxElement;
pub use interp::{EvalError, Interp, value_to_node};
pub use module::{Module, ModuleLoader};
pub use parser::{SyntaxError, parse_jsx_at};
pub use value::{Object, Scope, Value};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TsxError {
    #[error("{file}:{error}")]
    Syntax { file: String, error: SyntaxError },

    #[error(transparent)]
    Eval(#[from] EvalError),

    /// Import resolution or linking failure, already located.
    #[error("{0}")]
    Module(String),
}
