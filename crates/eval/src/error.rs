//! Evaluator-wide error and control-flow types (spec.md §9's "Control-flow
//! latches" design note, taken up rather than left as a baseline).
//!
//! The reference implementation polls mutable `had_error` / `returning` /
//! `breaking` / `continuing` flags at every statement boundary. Here the
//! result of evaluating a statement is a `Result<Flow, BriskError>`: loops
//! absorb `Flow::Break`/`Flow::Continue`, calls absorb `Flow::Return`,
//! blocks forward anything else, and an `Err` unwinds exactly the way the
//! flags did — running any defers registered in the scopes it passes
//! through (spec.md §4.3's "Defers and errors").

use brisk_core::Position;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Identifier referenced before any enclosing scope defined it.
    UndefinedVariable(String),
    /// `set` (assignment) to a binding declared with `::`.
    ConstViolation(String),
    /// Redeclaring a name already bound in the same scope.
    Redeclaration(String),
    /// An operator or builtin received operands of the wrong kind.
    TypeError(String),
    /// Array or string index outside `[0, len)`.
    IndexOutOfBounds { index: i64, len: usize },
    /// Division or modulo by zero.
    DivisionByZero,
    /// Called a value that is neither a function nor a native.
    NotCallable(String),
    /// Wrong number of arguments to a function/native call.
    ArityMismatch { expected: usize, got: usize },
    /// `@import` could not locate or load the named module/header.
    ImportError(String),
    /// A native/FFI call failed (symbol resolution, marshalling, or the
    /// call itself).
    FfiError(String),
    /// `break`/`continue`/`return` used outside a loop/function.
    MisplacedControlFlow(&'static str),
    /// The parser rejected the source.
    ParseError(String),
    /// `@c { ... }` inline-C block reached the evaluator (spec.md §9:
    /// recognized by the parser, unimplemented in the baseline).
    InlineCUnsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UndefinedVariable(name) => write!(f, "Undefined variable '{name}'"),
            ErrorKind::ConstViolation(name) => write!(f, "Cannot assign to constant '{name}'"),
            ErrorKind::Redeclaration(name) => {
                write!(f, "'{name}' is already declared in this scope")
            }
            ErrorKind::TypeError(msg) => write!(f, "Type error: {msg}"),
            ErrorKind::IndexOutOfBounds { index, len } => {
                write!(f, "Index {index} out of bounds (length {len})")
            }
            ErrorKind::DivisionByZero => write!(f, "Division by zero"),
            ErrorKind::NotCallable(kind) => write!(f, "Value of type '{kind}' is not callable"),
            ErrorKind::ArityMismatch { expected, got } => {
                write!(f, "Expected {expected} argument(s), got {got}")
            }
            ErrorKind::ImportError(msg) => write!(f, "Import error: {msg}"),
            ErrorKind::FfiError(msg) => write!(f, "FFI error: {msg}"),
            ErrorKind::MisplacedControlFlow(kw) => write!(f, "'{kw}' used outside a loop/function"),
            ErrorKind::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ErrorKind::InlineCUnsupported => {
                write!(f, "@c inline-C blocks are not executable in this build")
            }
        }
    }
}

/// A runtime or parse error with the source position it occurred at.
#[derive(Debug, Clone, PartialEq)]
pub struct BriskError {
    pub kind: ErrorKind,
    pub pos: Position,
}

impl BriskError {
    pub fn new(kind: ErrorKind, pos: Position) -> Self {
        BriskError { kind, pos }
    }
}

impl fmt::Display for BriskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.pos)
    }
}

impl std::error::Error for BriskError {}

/// The outcome of evaluating a statement (spec.md §9's redesign of the
/// reference implementation's `returning`/`breaking`/`continuing` latches
/// as a sum type instead of three pollable flags).
///
/// `last_value` — "the most recent expression-statement value, used for
/// implicit return" (spec.md §4.3.1) — is deliberately *not* part of
/// `Flow`: only `Stmt::Expr` and `Stmt::Match` touch it, so it is threaded
/// through `Interpreter::exec_stmt` as an explicit `&mut Value` accumulator
/// rather than folded into every statement's result.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell off the end of this statement with no pending interrupt.
    Normal,
    Return(brisk_core::Value),
    Break,
    Continue,
}
