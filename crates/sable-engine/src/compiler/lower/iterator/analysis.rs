//! Iterator body analysis
//!
//! Runs before any state is built. Rejects constructs the state machine
//! cannot express and works out which locals need storage that outlives a
//! single `moveNext` call:
//!
//! - every parameter,
//! - every local in scope at some `yield return`,
//! - every local read or written by the finally body of a try region (a try
//!   whose body suspends), since that body also runs from `dispose`.

use crate::compiler::error::{CompileError, CompileResult};
use crate::syntax::{Callee, Expr, ExprKind, Local, LocalId, Stmt, StmtKind};
use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub(crate) struct BodyAnalysis {
    /// Locals needing machine storage, parameters first
    pub hoisted: Vec<Local>,
    /// Locals in scope at each `yield return`, in source order
    pub live_at_suspend: Vec<Vec<LocalId>>,
}

impl BodyAnalysis {
    pub fn hoisted_ids(&self) -> FxHashSet<LocalId> {
        self.hoisted.iter().map(|l| l.id).collect()
    }
}

pub(crate) fn analyze(params: &[Local], body: &[Stmt]) -> CompileResult<BodyAnalysis> {
    let mut walker = Walker {
        scopes: vec![params.to_vec()],
        handler_depth: 0,
        finally_depth: 0,
        seen: FxHashSet::default(),
        analysis: BodyAnalysis::default(),
    };
    for p in params {
        walker.hoist(p);
    }
    walker.block(body)?;
    Ok(walker.analysis)
}

struct Walker {
    scopes: Vec<Vec<Local>>,
    handler_depth: u32,
    finally_depth: u32,
    seen: FxHashSet<LocalId>,
    analysis: BodyAnalysis,
}

impl Walker {
    fn hoist(&mut self, local: &Local) {
        if self.seen.insert(local.id) {
            self.analysis.hoisted.push(local.clone());
        }
    }

    fn block(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        self.scopes.push(Vec::new());
        let result = stmts.iter().try_for_each(|s| self.stmt(s));
        self.scopes.pop();
        result
    }

    fn nested(&mut self, stmt: &Stmt) -> CompileResult<()> {
        self.block(std::slice::from_ref(stmt))
    }

    fn declare(&mut self, local: &Local) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(local.clone());
        }
    }

    fn check_yield_context(&self, stmt: &Stmt) -> CompileResult<()> {
        if self.handler_depth > 0 {
            return Err(CompileError::unsupported(
                "yield inside a catch clause",
                stmt.span,
            ));
        }
        if self.finally_depth > 0 {
            return Err(CompileError::unsupported(
                "yield inside a finally clause",
                stmt.span,
            ));
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Local { local, .. } => self.declare(local),
            StmtKind::Block(stmts) => self.block(stmts)?,
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.nested(then_branch)?;
                if let Some(e) = else_branch {
                    self.nested(e)?;
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => self.nested(body)?,
            StmtKind::For { init, body, .. } => {
                self.scopes.push(Vec::new());
                let result = init
                    .iter()
                    .try_for_each(|s| self.stmt(s))
                    .and_then(|_| self.nested(body));
                self.scopes.pop();
                result?;
            }
            StmtKind::ForEach { local, body, .. } => {
                self.scopes.push(vec![local.clone()]);
                let result = self.nested(body);
                self.scopes.pop();
                result?;
            }
            StmtKind::Try(t) => {
                self.block(&t.body)?;
                for clause in &t.catches {
                    self.handler_depth += 1;
                    self.scopes.push(clause.local.iter().cloned().collect());
                    let result = self.block(&clause.body);
                    self.scopes.pop();
                    self.handler_depth -= 1;
                    result?;
                }
                if let Some(finally) = &t.finally {
                    if t.body.iter().any(Stmt::contains_suspend) {
                        for local in finally_references(finally) {
                            self.hoist(&local);
                        }
                    }
                    self.finally_depth += 1;
                    let result = self.block(finally);
                    self.finally_depth -= 1;
                    result?;
                }
            }
            StmtKind::Return(_) => {
                return Err(CompileError::unsupported(
                    "return statement in an iterator body",
                    stmt.span,
                ));
            }
            StmtKind::Goto(label) => {
                return Err(CompileError::unsupported(
                    format!("goto statement (label '{}')", label),
                    stmt.span,
                ));
            }
            StmtKind::YieldReturn(_) => {
                self.check_yield_context(stmt)?;
                let live: Vec<Local> = self.scopes.iter().flatten().cloned().collect();
                for local in &live {
                    self.hoist(local);
                }
                self.analysis
                    .live_at_suspend
                    .push(live.iter().map(|l| l.id).collect());
            }
            StmtKind::YieldBreak => self.check_yield_context(stmt)?,
            StmtKind::Expr(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Throw(_) => {}
        }
        Ok(())
    }
}

/// Locals a finally body uses but does not declare itself
fn finally_references(stmts: &[Stmt]) -> Vec<Local> {
    let mut used = Vec::new();
    let mut declared = FxHashSet::default();
    for s in stmts {
        stmt_locals(s, &mut used, &mut declared);
    }
    let mut seen = FxHashSet::default();
    used.into_iter()
        .filter(|l: &Local| !declared.contains(&l.id) && seen.insert(l.id))
        .collect()
}

fn each(stmts: &[Stmt], used: &mut Vec<Local>, declared: &mut FxHashSet<LocalId>) {
    for s in stmts {
        stmt_locals(s, used, declared);
    }
}

fn stmt_locals(stmt: &Stmt, used: &mut Vec<Local>, declared: &mut FxHashSet<LocalId>) {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::YieldReturn(e) | StmtKind::Throw(Some(e)) => {
            expr_locals(e, used)
        }
        StmtKind::Return(Some(e)) => expr_locals(e, used),
        StmtKind::Local { local, init } => {
            declared.insert(local.id);
            if let Some(init) = init {
                expr_locals(init, used);
            }
        }
        StmtKind::Block(stmts) => each(stmts, used, declared),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            expr_locals(cond, used);
            stmt_locals(then_branch, used, declared);
            if let Some(e) = else_branch {
                stmt_locals(e, used, declared);
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            expr_locals(cond, used);
            stmt_locals(body, used, declared);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            each(init, used, declared);
            if let Some(c) = cond {
                expr_locals(c, used);
            }
            for u in update {
                expr_locals(u, used);
            }
            stmt_locals(body, used, declared);
        }
        StmtKind::ForEach {
            local,
            iterable,
            body,
        } => {
            declared.insert(local.id);
            expr_locals(iterable, used);
            stmt_locals(body, used, declared);
        }
        StmtKind::Try(t) => {
            each(&t.body, used, declared);
            for c in &t.catches {
                if let Some(l) = &c.local {
                    declared.insert(l.id);
                }
                each(&c.body, used, declared);
            }
            if let Some(f) = &t.finally {
                each(f, used, declared);
            }
        }
        StmtKind::Return(None)
        | StmtKind::Throw(None)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::YieldBreak
        | StmtKind::Goto(_) => {}
    }
}

fn expr_locals(expr: &Expr, used: &mut Vec<Local>) {
    match &expr.kind {
        ExprKind::Literal(_) => {}
        ExprKind::Local(l) => used.push(l.clone()),
        ExprKind::Assign { target, value } => {
            used.push(target.clone());
            expr_locals(value, used);
        }
        ExprKind::Binary { left, right, .. } => {
            expr_locals(left, used);
            expr_locals(right, used);
        }
        ExprKind::Unary { operand, .. } => expr_locals(operand, used),
        ExprKind::Call { callee, args } => {
            if let Callee::Method { receiver, .. } = callee {
                expr_locals(receiver, used);
            }
            for a in args {
                expr_locals(a, used);
            }
        }
        ExprKind::New { args, .. } => {
            for a in args {
                expr_locals(a, used);
            }
        }
        ExprKind::Field { object, .. } => expr_locals(object, used),
    }
}
