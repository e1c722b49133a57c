//! Lexer, parser, tree-walking evaluator, built-in functions, and module
//! import resolution for Brisk (spec.md §4.2-§4.5).
//!
//! `brisk-cli` is the only downstream consumer: it drives a [`Parser`] over
//! either a script file or one REPL line at a time, then feeds the
//! resulting program into a persistent [`evaluator::Interpreter`].

pub mod builtins;
pub mod error;
pub mod evaluator;
pub mod import;
pub mod lexer;
pub mod parser;
pub mod token;

pub use error::{BriskError, ErrorKind};
pub use evaluator::Interpreter;
pub use parser::Parser;
