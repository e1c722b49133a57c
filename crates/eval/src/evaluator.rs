//! The tree-walking evaluator (spec.md §4.3).
//!
//! Follows spec.md §9's two redesign notes rather than the reference
//! implementation's literal mutable-flag / borrowed-AST scheme:
//! - Statement results are the [`Flow`] sum type, not three pollable
//!   booleans (see `crate::error::Flow`'s doc comment for how `last_value`
//!   is threaded separately).
//! - Function objects close over `Rc<ast::Block>`, so nothing needs to
//!   "leak" the AST to keep borrowed function bodies valid.

use crate::error::{BriskError, ErrorKind, Flow};
use crate::import::Importer;
use brisk_core::ast::*;
use brisk_core::{Environment, FunctionObj, Table, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub struct Interpreter {
    pub(crate) global: Rc<RefCell<Environment>>,
    current: Rc<RefCell<Environment>>,
    defer_stack: Vec<Vec<Stmt>>,
    loop_depth: u32,
    importer: Importer,
}

type EResult<T> = Result<T, BriskError>;

impl Interpreter {
    pub fn new() -> Self {
        let global = Environment::new_global();
        crate::builtins::install(&global);
        Interpreter {
            current: Rc::clone(&global),
            global,
            defer_stack: Vec::new(),
            loop_depth: 0,
            importer: Importer::new(),
        }
    }

    /// Builds an interpreter that executes into an *existing* global scope
    /// rather than a fresh one, without re-installing builtins (spec.md
    /// §4.5 step 1: a `.brisk` module "executes the resulting program in
    /// the current global environment").
    pub(crate) fn with_global(global: Rc<RefCell<Environment>>) -> Self {
        Interpreter {
            current: Rc::clone(&global),
            global,
            defer_stack: Vec::new(),
            loop_depth: 0,
            importer: Importer::new(),
        }
    }

    pub fn global_env(&self) -> &Rc<RefCell<Environment>> {
        &self.global
    }

    /// Forwards a loaded `brisk.toml`'s `[headers]` section to the import
    /// resolver (SPEC_FULL.md §14).
    pub fn configure_headers(&mut self, include_dirs: Vec<String>, library_hints: Vec<(String, String)>) {
        self.importer.configure(include_dirs, library_hints);
    }

    /// Run a whole program at the top level, returning the last
    /// expression-statement value (the REPL prints this).
    pub fn run(&mut self, program: &Program) -> EResult<Value> {
        let mut last_value = Value::Nil;
        self.defer_stack.push(Vec::new());
        let result = self.exec_stmts(&program.0, &mut last_value);
        let defers = self.defer_stack.pop().expect("defer frame pushed above");
        let defer_result = self.run_defers(defers, &mut last_value);
        defer_result?;
        match result? {
            Flow::Return(v) => Ok(v),
            Flow::Break | Flow::Continue => Err(BriskError::new(
                ErrorKind::MisplacedControlFlow("break/continue"),
                Position::default(),
            )),
            Flow::Normal => Ok(last_value),
        }
    }

    // ---- statement execution ----

    fn exec_stmts(&mut self, stmts: &[Stmt], last_value: &mut Value) -> EResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, last_value)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, last_value: &mut Value) -> EResult<Flow> {
        match stmt {
            Stmt::Expr(e) => {
                *last_value = self.eval_expr(e)?;
                Ok(Flow::Normal)
            }
            Stmt::VarDecl { name, value, pos } => {
                let v = self.eval_expr(value)?;
                self.current
                    .borrow_mut()
                    .define(name, v, false)
                    .map_err(|_| BriskError::new(ErrorKind::Redeclaration(name.clone()), *pos))?;
                Ok(Flow::Normal)
            }
            Stmt::ConstDecl { name, value, pos } => {
                let v = self.eval_expr(value)?;
                self.current
                    .borrow_mut()
                    .define(name, v, true)
                    .map_err(|_| BriskError::new(ErrorKind::Redeclaration(name.clone()), *pos))?;
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value, pos } => {
                let v = self.eval_expr(value)?;
                self.exec_assign(target, v, *pos)?;
                Ok(Flow::Normal)
            }
            Stmt::Block(b) => self.exec_block_new_scope(b, last_value),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval_expr(cond)?.is_truthy() {
                    self.exec_block_new_scope(then_branch, last_value)
                } else if let Some(else_stmt) = else_branch {
                    self.exec_stmt(else_stmt, last_value)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body, .. } => self.exec_while(cond, body, last_value),
            Stmt::For {
                var, iter, body, ..
            } => self.exec_for(var, iter, body, last_value),
            Stmt::Return(value, _) => {
                let v = match value {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(v))
            }
            Stmt::Break(pos) => {
                if self.loop_depth == 0 {
                    return Err(BriskError::new(
                        ErrorKind::MisplacedControlFlow("break"),
                        *pos,
                    ));
                }
                Ok(Flow::Break)
            }
            Stmt::Continue(pos) => {
                if self.loop_depth == 0 {
                    return Err(BriskError::new(
                        ErrorKind::MisplacedControlFlow("continue"),
                        *pos,
                    ));
                }
                Ok(Flow::Continue)
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => self.exec_match(scrutinee, arms, last_value),
            Stmt::Defer(inner, _) => {
                if let Some(frame) = self.defer_stack.last_mut() {
                    frame.push((**inner).clone());
                }
                Ok(Flow::Normal)
            }
            Stmt::FnDecl {
                name, params, body, ..
            } => {
                let f = Value::function(FunctionObj {
                    name: Some(name.clone()),
                    params: Rc::from(params.clone().into_boxed_slice()),
                    body: Rc::clone(body),
                    env: Rc::clone(&self.current),
                });
                self.current
                    .borrow_mut()
                    .define(name, f, false)
                    .map_err(|_| {
                        BriskError::new(ErrorKind::Redeclaration(name.clone()), stmt.pos())
                    })?;
                Ok(Flow::Normal)
            }
            Stmt::Import { path, pos } => {
                self.importer
                    .import(path, &self.global)
                    .map_err(|msg| BriskError::new(ErrorKind::ImportError(msg), *pos))?;
                Ok(Flow::Normal)
            }
            Stmt::InlineC { pos, .. } => {
                Err(BriskError::new(ErrorKind::InlineCUnsupported, *pos))
            }
        }
    }

    fn exec_block_new_scope(&mut self, block: &Block, last_value: &mut Value) -> EResult<Flow> {
        let scope = Environment::new_child(&self.current);
        self.exec_stmts_in_scope(scope, &block.0, last_value)
    }

    /// Execute `stmts` with `scope` as the current environment, honoring
    /// the defer-stack discipline described at spec.md §4.3.3: defers
    /// pushed in this scope run LIFO on every exit path, with their own
    /// `return`/`break`/`continue` results discarded so a deferred
    /// statement cannot hijack the outer unwind.
    fn exec_stmts_in_scope(
        &mut self,
        scope: Rc<RefCell<Environment>>,
        stmts: &[Stmt],
        last_value: &mut Value,
    ) -> EResult<Flow> {
        let saved = std::mem::replace(&mut self.current, scope);
        self.defer_stack.push(Vec::new());
        let result = self.exec_stmts(stmts, last_value);
        let defers = self.defer_stack.pop().expect("defer frame pushed above");
        let defer_result = self.run_defers(defers, last_value);
        self.current = saved;
        defer_result?;
        result
    }

    fn run_defers(&mut self, defers: Vec<Stmt>, last_value: &mut Value) -> EResult<()> {
        for stmt in defers.into_iter().rev() {
            // Masked: a deferred return/break/continue is swallowed, not
            // propagated, per spec.md §4.3.3.
            self.exec_stmt(&stmt, last_value)?;
        }
        Ok(())
    }

    fn exec_while(&mut self, cond: &Expr, body: &Block, last_value: &mut Value) -> EResult<Flow> {
        self.loop_depth += 1;
        let result = (|| loop {
            if !self.eval_expr(cond)?.is_truthy() {
                return Ok(Flow::Normal);
            }
            match self.exec_block_new_scope(body, last_value)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Continue | Flow::Normal => {}
                ret @ Flow::Return(_) => return Ok(ret),
            }
        })();
        self.loop_depth -= 1;
        result
    }

    fn exec_for(
        &mut self,
        var: &str,
        iter: &Expr,
        body: &Block,
        last_value: &mut Value,
    ) -> EResult<Flow> {
        let iter_pos = iter.pos();
        let iter_val = self.eval_expr(iter)?;
        let items: Vec<Value> = iter_val
            .as_array()
            .ok_or_else(|| {
                BriskError::new(
                    ErrorKind::TypeError(format!(
                        "for-in requires an array, got {}",
                        iter_val.kind_name()
                    )),
                    iter_pos,
                )
            })?
            .borrow()
            .clone();

        let loop_scope = Environment::new_child(&self.current);
        loop_scope
            .borrow_mut()
            .define(var, Value::Nil, false)
            .expect("fresh scope never already defines the iterator variable");

        let saved = std::mem::replace(&mut self.current, loop_scope.clone());
        self.loop_depth += 1;
        let result = (|| {
            for item in items {
                loop_scope
                    .borrow_mut()
                    .set(var, item)
                    .expect("iterator variable was just defined in this scope");
                let body_scope = Environment::new_child(&loop_scope);
                match self.exec_stmts_in_scope(body_scope, &body.0, last_value)? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Continue | Flow::Normal => {}
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            }
            Ok(Flow::Normal)
        })();
        self.loop_depth -= 1;
        self.current = saved;
        result
    }

    fn exec_match(
        &mut self,
        scrutinee: &Expr,
        arms: &[MatchArm],
        last_value: &mut Value,
    ) -> EResult<Flow> {
        let value = self.eval_expr(scrutinee)?;
        for arm in arms {
            let matched = match &arm.pattern {
                MatchPattern::Wildcard => true,
                MatchPattern::Range(Expr::Range { start, end, .. }) => {
                    let lo = self.eval_expr(start)?;
                    let hi = self.eval_expr(end)?;
                    match (&value, lo, hi) {
                        (Value::Int(n), Value::Int(lo), Value::Int(hi)) => *n >= lo && *n < hi,
                        _ => false,
                    }
                }
                MatchPattern::Range(_) => unreachable!("parser only builds Range patterns from Expr::Range"),
                MatchPattern::Expr(e) => {
                    let candidate = self.eval_expr(e)?;
                    value.value_equals(&candidate)
                }
            };
            if matched {
                return match &arm.body {
                    MatchBody::Expr(e) => {
                        *last_value = self.eval_expr(e)?;
                        Ok(Flow::Normal)
                    }
                    MatchBody::Block(b) => self.exec_block_new_scope(b, last_value),
                };
            }
        }
        // spec.md §8: "match with no matching arm and no wildcard leaves
        // last_value unchanged."
        Ok(Flow::Normal)
    }

    fn exec_assign(&mut self, target: &AssignTarget, value: Value, pos: Position) -> EResult<()> {
        match target {
            AssignTarget::Identifier(name) => {
                self.current.borrow_mut().set(name, value).map_err(|e| {
                    use brisk_core::environment::SetError;
                    match e {
                        SetError::Const(n) => BriskError::new(ErrorKind::ConstViolation(n), pos),
                        SetError::Undefined(n) => {
                            BriskError::new(ErrorKind::UndefinedVariable(n), pos)
                        }
                    }
                })
            }
            AssignTarget::Index { target, index } => {
                let target_val = self.eval_expr(target)?;
                let index_val = self.eval_expr(index)?;
                self.assign_index(&target_val, &index_val, value, pos)
            }
            AssignTarget::Field { target, name } => {
                let target_val = self.eval_expr(target)?;
                if target_val.as_cstruct().is_some() {
                    return brisk_runtime::cstruct::set_field(&target_val, name, &value)
                        .map_err(|msg| BriskError::new(ErrorKind::FfiError(msg), pos));
                }
                let table = target_val.as_table().ok_or_else(|| {
                    BriskError::new(
                        ErrorKind::TypeError(format!(
                            "field assignment requires a table or cstruct, got {}",
                            target_val.kind_name()
                        )),
                        pos,
                    )
                })?;
                table.borrow_mut().define(name, value, false);
                Ok(())
            }
        }
    }

    fn assign_index(
        &mut self,
        target: &Value,
        index: &Value,
        value: Value,
        pos: Position,
    ) -> EResult<()> {
        match (target.as_array(), index) {
            (Some(arr), Value::Int(i)) => {
                let mut arr = arr.borrow_mut();
                let idx = usize::try_from(*i).ok().filter(|i| *i < arr.len());
                match idx {
                    Some(idx) => {
                        arr[idx] = value;
                        Ok(())
                    }
                    None => Err(BriskError::new(
                        ErrorKind::IndexOutOfBounds {
                            index: *i,
                            len: arr.len(),
                        },
                        pos,
                    )),
                }
            }
            _ => match (target.as_table(), index) {
                (Some(table), Value::Obj(_)) if index.as_str().is_some() => {
                    table.borrow_mut().define(index.as_str().unwrap(), value, false);
                    Ok(())
                }
                _ => Err(BriskError::new(
                    ErrorKind::TypeError(format!(
                        "cannot index-assign {} with {}",
                        target.kind_name(),
                        index.kind_name()
                    )),
                    pos,
                )),
            },
        }
    }

    // ---- expression evaluation ----

    pub fn eval_expr(&mut self, expr: &Expr) -> EResult<Value> {
        match expr {
            Expr::Literal(lit, _) => Ok(literal_to_value(lit)),
            Expr::Identifier(name, pos) => self
                .current
                .borrow()
                .get(name)
                .ok_or_else(|| BriskError::new(ErrorKind::UndefinedVariable(name.clone()), *pos)),
            Expr::Binary {
                op, left, right, pos,
            } => self.eval_binary(*op, left, right, *pos),
            Expr::Unary { op, expr, pos } => self.eval_unary(*op, expr, *pos),
            Expr::Call { callee, args, pos } => self.eval_call(callee, args, *pos),
            Expr::Index { target, index, pos } => self.eval_index(target, index, *pos),
            Expr::Field { target, name, pos } => self.eval_field(target, name, *pos),
            Expr::ArrayLit(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item)?);
                }
                Ok(Value::array(values))
            }
            Expr::TableLit(fields, _) => {
                let mut table = Table::new();
                for (key, value) in fields {
                    let v = self.eval_expr(value)?;
                    table.define(key, v, false);
                }
                Ok(Value::table(table))
            }
            Expr::Range { start, end, pos } => self.eval_range(start, end, *pos),
            Expr::Lambda { params, body, .. } => Ok(Value::function(FunctionObj {
                name: None,
                params: Rc::from(params.clone().into_boxed_slice()),
                body: Rc::clone(body),
                env: Rc::clone(&self.current),
            })),
            Expr::AddressOf(inner, pos) => {
                let v = self.eval_expr(inner)?;
                brisk_runtime::cstruct::address_of(&v)
                    .map_err(|msg| BriskError::new(ErrorKind::TypeError(msg), *pos))
            }
        }
    }

    fn eval_range(&mut self, start: &Expr, end: &Expr, pos: Position) -> EResult<Value> {
        let start_v = self.eval_expr(start)?;
        let end_v = self.eval_expr(end)?;
        match (start_v, end_v) {
            (Value::Int(s), Value::Int(e)) => {
                let items: Vec<Value> = if s <= e {
                    (s..e).map(Value::Int).collect()
                } else {
                    (e + 1..=s).rev().map(Value::Int).collect()
                };
                Ok(Value::array(items))
            }
            (s, e) => Err(BriskError::new(
                ErrorKind::TypeError(format!(
                    "range bounds must be ints, got {} and {}",
                    s.kind_name(),
                    e.kind_name()
                )),
                pos,
            )),
        }
    }

    fn eval_unary(&mut self, op: UnOp, expr: &Expr, pos: Position) -> EResult<Value> {
        let v = self.eval_expr(expr)?;
        match op {
            UnOp::Neg => match v {
                Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                Value::Float(f) => Ok(Value::Float(-f)),
                _ => Err(BriskError::new(
                    ErrorKind::TypeError(format!("cannot negate {}", v.kind_name())),
                    pos,
                )),
            },
            UnOp::Not => Ok(Value::Bool(!v.is_truthy())),
        }
    }

    fn eval_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, pos: Position) -> EResult<Value> {
        // `and`/`or` short-circuit and never evaluate `right` unnecessarily,
        // and return the operand itself rather than a coerced bool
        // (spec.md §4.3.2).
        match op {
            BinOp::And => {
                let l = self.eval_expr(left)?;
                if !l.is_truthy() {
                    return Ok(l);
                }
                return self.eval_expr(right);
            }
            BinOp::Or => {
                let l = self.eval_expr(left)?;
                if l.is_truthy() {
                    return Ok(l);
                }
                return self.eval_expr(right);
            }
            _ => {}
        }

        let l = self.eval_expr(left)?;
        let r = self.eval_expr(right)?;

        match op {
            BinOp::Eq => return Ok(Value::Bool(l.value_equals(&r))),
            BinOp::NotEq => return Ok(Value::Bool(!l.value_equals(&r))),
            _ => {}
        }

        if op == BinOp::Add {
            if let Some(ls) = l.as_str() {
                let rs = match r.as_str() {
                    Some(rs) => rs.to_string(),
                    None => r.to_display_string(),
                };
                return Ok(Value::str(&format!("{ls}{rs}")));
            }
        }

        match (op, &l, &r) {
            (BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq, _, _) => {
                let (lf, rf) = numeric_pair(&l, &r, pos)?;
                Ok(Value::Bool(match op {
                    BinOp::Lt => lf < rf,
                    BinOp::LtEq => lf <= rf,
                    BinOp::Gt => lf > rf,
                    BinOp::GtEq => lf >= rf,
                    _ => unreachable!(),
                }))
            }
            _ => self.eval_arith(op, &l, &r, pos),
        }
    }

    fn eval_arith(&self, op: BinOp, l: &Value, r: &Value, pos: Position) -> EResult<Value> {
        match (l, r) {
            (Value::Int(a), Value::Int(b)) => match op {
                BinOp::Add => Ok(Value::Int(a.wrapping_add(*b))),
                BinOp::Sub => Ok(Value::Int(a.wrapping_sub(*b))),
                BinOp::Mul => Ok(Value::Int(a.wrapping_mul(*b))),
                BinOp::Div => {
                    if *b == 0 {
                        Err(BriskError::new(ErrorKind::DivisionByZero, pos))
                    } else {
                        Ok(Value::Int(a.wrapping_div(*b)))
                    }
                }
                BinOp::Mod => {
                    if *b == 0 {
                        Err(BriskError::new(ErrorKind::DivisionByZero, pos))
                    } else {
                        Ok(Value::Int(a.wrapping_rem(*b)))
                    }
                }
                _ => Err(BriskError::new(
                    ErrorKind::TypeError(format!("unsupported operator for ints: {op:?}")),
                    pos,
                )),
            },
            (a, b) if is_numeric(a) && is_numeric(b) => {
                let (af, bf) = numeric_pair(a, b, pos)?;
                match op {
                    BinOp::Add => Ok(Value::Float(af + bf)),
                    BinOp::Sub => Ok(Value::Float(af - bf)),
                    BinOp::Mul => Ok(Value::Float(af * bf)),
                    BinOp::Div => {
                        if bf == 0.0 {
                            Err(BriskError::new(ErrorKind::DivisionByZero, pos))
                        } else {
                            Ok(Value::Float(af / bf))
                        }
                    }
                    BinOp::Mod => {
                        if bf == 0.0 {
                            Err(BriskError::new(ErrorKind::DivisionByZero, pos))
                        } else {
                            Ok(Value::Float(af % bf))
                        }
                    }
                    _ => Err(BriskError::new(
                        ErrorKind::TypeError(format!("unsupported operator for floats: {op:?}")),
                        pos,
                    )),
                }
            }
            _ => Err(BriskError::new(
                ErrorKind::TypeError(format!(
                    "operator {op:?} requires numeric operands, got {} and {}",
                    l.kind_name(),
                    r.kind_name()
                )),
                pos,
            )),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], pos: Position) -> EResult<Value> {
        let callee_val = self.eval_expr(callee)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for a in args {
            arg_values.push(self.eval_expr(a)?);
        }
        self.call_value(&callee_val, arg_values, pos)
    }

    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>, pos: Position) -> EResult<Value> {
        if let Some(native) = callee.as_native() {
            if native.arity >= 0 && native.arity as usize != args.len() {
                return Err(BriskError::new(
                    ErrorKind::ArityMismatch {
                        expected: native.arity as usize,
                        got: args.len(),
                    },
                    pos,
                ));
            }
            return (native.func)(&args).map_err(|msg| BriskError::new(ErrorKind::TypeError(msg), pos));
        }
        if let Some(descriptor) = callee.as_cfunction() {
            return brisk_runtime::ffi_bridge::call(descriptor, &args)
                .map_err(|msg| BriskError::new(ErrorKind::FfiError(msg), pos));
        }
        if let Some(f) = callee.as_function() {
            if f.arity() != args.len() {
                return Err(BriskError::new(
                    ErrorKind::ArityMismatch {
                        expected: f.arity(),
                        got: args.len(),
                    },
                    pos,
                ));
            }
            let call_env = Environment::new_child(&f.env);
            {
                let mut env = call_env.borrow_mut();
                for (param, arg) in f.params.iter().zip(args.into_iter()) {
                    env.define(param, arg, false)
                        .expect("fresh call scope never redeclares a parameter");
                }
            }
            let body = Rc::clone(&f.body);
            let mut last_value = Value::Nil;
            let flow = self.exec_stmts_in_scope(call_env, &body.0, &mut last_value)?;
            return Ok(match flow {
                Flow::Return(v) => v,
                Flow::Normal => last_value,
                Flow::Break | Flow::Continue => {
                    return Err(BriskError::new(
                        ErrorKind::MisplacedControlFlow("break/continue"),
                        pos,
                    ));
                }
            });
        }
        Err(BriskError::new(
            ErrorKind::NotCallable(callee.kind_name().to_string()),
            pos,
        ))
    }

    fn eval_index(&mut self, target: &Expr, index: &Expr, pos: Position) -> EResult<Value> {
        let t = self.eval_expr(target)?;
        let i = self.eval_expr(index)?;
        match (&t, &i) {
            (_, Value::Int(n)) if t.as_array().is_some() => {
                let arr = t.as_array().unwrap().borrow();
                usize::try_from(*n)
                    .ok()
                    .and_then(|idx| arr.get(idx).cloned())
                    .ok_or_else(|| {
                        BriskError::new(
                            ErrorKind::IndexOutOfBounds {
                                index: *n,
                                len: arr.len(),
                            },
                            pos,
                        )
                    })
            }
            (_, Value::Int(n)) if t.as_str().is_some() => {
                let s = t.as_str().unwrap();
                let chars: Vec<char> = s.chars().collect();
                usize::try_from(*n)
                    .ok()
                    .and_then(|idx| chars.get(idx))
                    .map(|c| Value::str(&c.to_string()))
                    .ok_or_else(|| {
                        BriskError::new(
                            ErrorKind::IndexOutOfBounds {
                                index: *n,
                                len: chars.len(),
                            },
                            pos,
                        )
                    })
            }
            (_, _) if t.as_table().is_some() => {
                let key = i.as_str().ok_or_else(|| {
                    BriskError::new(
                        ErrorKind::TypeError("table index must be a string".into()),
                        pos,
                    )
                })?;
                Ok(t.as_table().unwrap().borrow().get(key).cloned().unwrap_or(Value::Nil))
            }
            _ => Err(BriskError::new(
                ErrorKind::TypeError(format!(
                    "cannot index {} with {}",
                    t.kind_name(),
                    i.kind_name()
                )),
                pos,
            )),
        }
    }

    fn eval_field(&mut self, target: &Expr, name: &str, pos: Position) -> EResult<Value> {
        let t = self.eval_expr(target)?;
        if t.as_cstruct().is_some() {
            return brisk_runtime::cstruct::get_field(&t, name)
                .map_err(|msg| BriskError::new(ErrorKind::FfiError(msg), pos));
        }
        let table = t.as_table().ok_or_else(|| {
            BriskError::new(
                ErrorKind::TypeError(format!(
                    "field access requires a table or cstruct, got {}",
                    t.kind_name()
                )),
                pos,
            )
        })?;
        Ok(table.borrow().get(name).cloned().unwrap_or(Value::Nil))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Nil => Value::Nil,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::str(s),
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_))
}

fn numeric_pair(l: &Value, r: &Value, pos: Position) -> EResult<(f64, f64)> {
    let lf = as_f64(l).ok_or_else(|| {
        BriskError::new(
            ErrorKind::TypeError(format!("expected a number, got {}", l.kind_name())),
            pos,
        )
    })?;
    let rf = as_f64(r).ok_or_else(|| {
        BriskError::new(
            ErrorKind::TypeError(format!("expected a number, got {}", r.kind_name())),
            pos,
        )
    })?;
    Ok((lf, rf))
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run_src(src: &str) -> Value {
        let prog = Parser::new(src).unwrap().parse_program().unwrap();
        Interpreter::new().run(&prog).unwrap()
    }

    #[test]
    fn arithmetic_and_implicit_return() {
        let v = run_src("fn f(x) { x * x }\nf(7)");
        assert_eq!(v.to_display_string(), "49");
    }

    #[test]
    fn closures_capture_mutable_state() {
        let mut interp = Interpreter::new();
        let prog = Parser::new(
            "fn make_counter() { c := 0; fn() { c = c + 1; c } }\nk := make_counter(); [k(), k(), k()]",
        )
        .unwrap()
        .parse_program()
        .unwrap();
        let v = interp.run(&prog).unwrap();
        let arr = v.as_array().unwrap().borrow();
        let nums: Vec<String> = arr.iter().map(Value::to_display_string).collect();
        assert_eq!(nums, vec!["1", "2", "3"]);
    }

    #[test]
    fn defer_runs_lifo() {
        let mut interp = Interpreter::new();
        let prog = Parser::new(
            r#"log := []
fn g() { defer push(log, "a"); defer push(log, "b"); push(log, "c") }
g()
log"#,
        )
        .unwrap()
        .parse_program()
        .unwrap();
        let v = interp.run(&prog).unwrap();
        let arr = v.as_array().unwrap().borrow();
        let items: Vec<String> = arr.iter().map(|v| v.as_str().unwrap().to_string()).collect();
        assert_eq!(items, vec!["c", "b", "a"]);
    }

    #[test]
    fn match_with_range_pattern() {
        let v = run_src(
            r#"fn grade(s) { match s { 90..101 => "A", 80..90 => "B", _ => "F" } }
[grade(95), grade(85), grade(50)]"#,
        );
        let arr = v.as_array().unwrap().borrow();
        let items: Vec<&str> = arr.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(items, vec!["A", "B", "F"]);
    }

    #[test]
    fn const_violation_errors() {
        let prog = Parser::new("PI :: 3.14\nPI = 3")
            .unwrap()
            .parse_program()
            .unwrap();
        let err = Interpreter::new().run(&prog).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstViolation("PI".to_string()));
    }

    #[test]
    fn table_has_reports_key_presence() {
        let v = run_src(r#"t := {a: 1, b: 2}; [has(t, "a"), has(t, "c")]"#);
        let arr = v.as_array().unwrap().borrow();
        assert_eq!(arr[0].to_display_string(), "true");
        assert_eq!(arr[1].to_display_string(), "false");
    }

    #[test]
    fn and_or_return_operand_not_bool() {
        let v = run_src(r#"0 and 5"#);
        assert_eq!(v.to_display_string(), "0");
        let v = run_src(r#"5 or 0"#);
        assert_eq!(v.to_display_string(), "5");
    }

    #[test]
    fn array_index_negative_one_is_out_of_bounds() {
        let prog = Parser::new("a := [1, 2, 3]\na[-1]")
            .unwrap()
            .parse_program()
            .unwrap();
        // -1 fails usize::try_from, surfaced as out-of-bounds.
        let err = Interpreter::new().run(&prog).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IndexOutOfBounds { .. }));
    }

    #[test]
    fn for_over_empty_array_runs_zero_times_and_hides_binding() {
        let prog = Parser::new("for x in [] { }\nx")
            .unwrap()
            .parse_program()
            .unwrap();
        let err = Interpreter::new().run(&prog).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedVariable(_)));
    }
}
