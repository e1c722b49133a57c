//! Abstract syntax tree for Brisk.
//!
//! Owned outside the evaluator (by whoever parsed the source) the way
//! spec.md describes it — except that "owned outside" here means "kept
//! alive by `Rc`", not "borrowed through a raw pointer": function values
//! close over `Rc<Block>` subtrees (see `brisk_core::value::FunctionObj`)
//! so a function can outlive the parser that produced its body without the
//! reference implementation's AST-leak workaround (spec.md §9).

use std::rc::Rc;

/// 1-indexed source position used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    pub fn new(line: u32, col: u32) -> Self {
        Position { line, col }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Position),
    Identifier(String, Position),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Position,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        pos: Position,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Position,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        pos: Position,
    },
    Field {
        target: Box<Expr>,
        name: String,
        pos: Position,
    },
    ArrayLit(Vec<Expr>, Position),
    TableLit(Vec<(String, Expr)>, Position),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        pos: Position,
    },
    Lambda {
        params: Vec<String>,
        body: Rc<Block>,
        pos: Position,
    },
    AddressOf(Box<Expr>, Position),
}

impl Expr {
    pub fn pos(&self) -> Position {
        match self {
            Expr::Literal(_, p)
            | Expr::Identifier(_, p)
            | Expr::Binary { pos: p, .. }
            | Expr::Unary { pos: p, .. }
            | Expr::Call { pos: p, .. }
            | Expr::Index { pos: p, .. }
            | Expr::Field { pos: p, .. }
            | Expr::ArrayLit(_, p)
            | Expr::TableLit(_, p)
            | Expr::Range { pos: p, .. }
            | Expr::Lambda { pos: p, .. }
            | Expr::AddressOf(_, p) => *p,
        }
    }
}

/// A lexical block: a sequence of statements executed in a fresh scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block(pub Vec<Stmt>);

#[derive(Debug, Clone, PartialEq)]
pub enum MatchPattern {
    /// The `_` wildcard arm.
    Wildcard,
    /// `lo..hi`, matched against an int scrutinee with `lo <= s < hi`.
    Range(Expr),
    /// Any other expression, compared with `value_equals`.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchBody {
    Block(Rc<Block>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: MatchPattern,
    pub body: MatchBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Identifier(String),
    Index { target: Expr, index: Expr },
    Field { target: Expr, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// An expression statement; its value feeds `last_value` for implicit
    /// return.
    Expr(Expr),
    VarDecl {
        name: String,
        value: Expr,
        pos: Position,
    },
    ConstDecl {
        name: String,
        value: Expr,
        pos: Position,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
        pos: Position,
    },
    Block(Rc<Block>),
    If {
        cond: Expr,
        then_branch: Rc<Block>,
        /// The else branch. May itself wrap a single `Stmt::If` to encode
        /// `elif` chains, or a `Stmt::Block` for a plain `else`.
        else_branch: Option<Box<Stmt>>,
        pos: Position,
    },
    While {
        cond: Expr,
        body: Rc<Block>,
        pos: Position,
    },
    For {
        var: String,
        iter: Expr,
        body: Rc<Block>,
        pos: Position,
    },
    Return(Option<Expr>, Position),
    Break(Position),
    Continue(Position),
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
        pos: Position,
    },
    /// Pushes its inner statement onto the defer stack rather than
    /// executing it immediately.
    Defer(Box<Stmt>, Position),
    FnDecl {
        name: String,
        params: Vec<String>,
        body: Rc<Block>,
        pos: Position,
    },
    Import {
        path: String,
        pos: Position,
    },
    /// Recognized by the parser, rejected by the evaluator (spec.md §9 /
    /// SPEC_FULL.md §17).
    InlineC {
        source: String,
        pos: Position,
    },
}

impl Stmt {
    pub fn pos(&self) -> Position {
        match self {
            Stmt::Expr(e) => e.pos(),
            Stmt::VarDecl { pos, .. }
            | Stmt::ConstDecl { pos, .. }
            | Stmt::Assign { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::While { pos, .. }
            | Stmt::For { pos, .. }
            | Stmt::Return(_, pos)
            | Stmt::Break(pos)
            | Stmt::Continue(pos)
            | Stmt::Match { pos, .. }
            | Stmt::Defer(_, pos)
            | Stmt::FnDecl { pos, .. }
            | Stmt::Import { pos, .. }
            | Stmt::InlineC { pos, .. } => *pos,
            Stmt::Block(b) => b.0.first().map(Stmt::pos).unwrap_or_default(),
        }
    }
}

/// A whole parsed program, i.e. a module's top-level statement list.
pub type Program = Block;
