//! Statement lowering
//!
//! Lowers statements that need no state-machine treatment. Inside an iterator
//! this still covers most of the body: only statements that contain a
//! `yield return` are split into states, everything else is lowered here and
//! appended to the current state.

use super::control_flow::{Jump, LoopContext};
use super::iterator::machine::{CURRENT_FIELD, STATE_FIELD};
use super::Lowerer;
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::ir::{LExpr, LStmt, LStmtKind, Origin};
use crate::syntax::{Expr, Local, Span, Stmt, StmtKind};

impl<'a> Lowerer<'a> {
    pub(super) fn lower_block(&mut self, stmts: &[Stmt]) -> CompileResult<Vec<LStmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.lower_stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    /// Lower a statement used as a branch or loop body
    fn lower_nested(&mut self, stmt: &Stmt) -> CompileResult<Vec<LStmt>> {
        let mut out = Vec::new();
        self.lower_stmt(stmt, &mut out)?;
        Ok(out)
    }

    pub(super) fn lower_stmt(&mut self, stmt: &Stmt, out: &mut Vec<LStmt>) -> CompileResult<()> {
        let origin = Origin::from_span(stmt.span);
        match &stmt.kind {
            StmtKind::Expr(e) => {
                let e = self.lower_expr(e);
                out.push(LStmt::expr(e).with_origin(origin));
            }
            StmtKind::Local { local, init } => {
                if let Some(s) = self.declare_local(local, init.as_ref(), stmt.span) {
                    out.push(s);
                }
            }
            // Target `var` is function scoped, so blocks flatten
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.lower_stmt(s, out)?;
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.lower_expr(cond);
                let then_branch = self.lower_nested(then_branch)?;
                let else_branch = match else_branch {
                    Some(e) => Some(self.lower_nested(e)?),
                    None => None,
                };
                out.push(LStmt::if_(cond, then_branch, else_branch).with_origin(origin));
            }
            StmtKind::While { cond, body } => {
                let cond = self.lower_expr(cond);
                let body = self.lower_loop_body(body)?;
                out.push(
                    LStmt::new(LStmtKind::While {
                        label: None,
                        cond,
                        body,
                    })
                    .with_origin(origin),
                );
            }
            StmtKind::DoWhile { body, cond } => {
                let body = self.lower_loop_body(body)?;
                let cond = self.lower_expr(cond);
                out.push(
                    LStmt::new(LStmtKind::DoWhile {
                        label: None,
                        body,
                        cond,
                    })
                    .with_origin(origin),
                );
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                for s in init {
                    self.lower_stmt(s, out)?;
                }
                let cond = cond.as_ref().map(|c| self.lower_expr(c));
                let update = self.lower_exprs(update);
                let body = self.lower_loop_body(body)?;
                out.push(
                    LStmt::new(LStmtKind::For {
                        label: None,
                        cond,
                        update,
                        body,
                    })
                    .with_origin(origin),
                );
            }
            StmtKind::ForEach { .. } => {
                return Err(CompileError::internal("foreach reached lowering undesugared"));
            }
            StmtKind::Break => {
                let target = self.loop_stack.break_target();
                out.extend(self.lower_jump(target, "break", stmt.span)?);
            }
            StmtKind::Continue => {
                let target = self.loop_stack.continue_target();
                out.extend(self.lower_jump(target, "continue", stmt.span)?);
            }
            StmtKind::Return(value) => {
                if self.in_iterator() {
                    return Err(CompileError::unsupported(
                        "return statement in an iterator body",
                        stmt.span,
                    ));
                }
                let value = value.as_ref().map(|v| self.lower_expr(v));
                out.push(LStmt::ret(value).with_origin(origin));
            }
            StmtKind::Throw(Some(value)) => {
                let value = self.lower_expr(value);
                out.push(LStmt::throw(value).with_origin(origin));
            }
            StmtKind::Throw(None) => {
                // Rethrow the caught value itself so identity is preserved
                let Some(temp) = self.catch_temps.last() else {
                    return Err(CompileError::unsupported(
                        "rethrow outside of a catch clause",
                        stmt.span,
                    ));
                };
                out.push(LStmt::throw(LExpr::ident(temp.clone())).with_origin(origin));
            }
            StmtKind::Try(t) => {
                let lowered = self.lower_try(t, stmt.span)?;
                out.push(lowered);
            }
            StmtKind::YieldReturn(_) => {
                if self.in_iterator() {
                    return Err(CompileError::internal(
                        "suspend point reached plain statement lowering",
                    ));
                }
                return Err(CompileError::unsupported(
                    "yield return outside of an iterator",
                    stmt.span,
                ));
            }
            StmtKind::YieldBreak => {
                if !self.in_iterator() {
                    return Err(CompileError::unsupported(
                        "yield break outside of an iterator",
                        stmt.span,
                    ));
                }
                out.push(LStmt::assign(STATE_FIELD, LExpr::int(-1)).with_origin(origin));
                out.push(LStmt::ret(Some(LExpr::boolean(false))));
            }
            StmtKind::Goto(label) => {
                return Err(CompileError::unsupported(
                    format!("goto statement (label '{}')", label),
                    stmt.span,
                ));
            }
        }
        Ok(())
    }

    fn lower_loop_body(&mut self, body: &Stmt) -> CompileResult<Vec<LStmt>> {
        self.loop_stack.push(LoopContext::native());
        let result = self.lower_nested(body);
        self.loop_stack.pop();
        result
    }

    fn lower_jump(&mut self, target: Jump, keyword: &str, span: Span) -> CompileResult<Vec<LStmt>> {
        let origin = Origin::from_span(span);
        match target {
            Jump::Native if keyword == "break" => Ok(vec![LStmt::break_to(None).with_origin(origin)]),
            Jump::Native => Ok(vec![LStmt::continue_to(None).with_origin(origin)]),
            Jump::State(state) => {
                let mut stmts = self.goto_state(state)?;
                if let Some(first) = stmts.first_mut() {
                    first.origin = origin;
                }
                Ok(stmts)
            }
            Jump::CrossesBarrier => Err(CompileError::unsupported(
                format!("{} out of a finally clause", keyword),
                span,
            )),
            Jump::NoLoop => Err(CompileError::unsupported(
                format!("{} outside of a loop", keyword),
                span,
            )),
        }
    }

    /// Declaration of a local. Inside an iterator a hoisted local already has
    /// storage, so its declaration turns into a plain assignment (or nothing).
    pub(super) fn declare_local(
        &mut self,
        local: &Local,
        init: Option<&Expr>,
        span: Span,
    ) -> Option<LStmt> {
        let name = self.local_name(local);
        let origin = Origin::named(span, local.name.clone());
        let init = init.map(|e| self.lower_expr(e));
        if self.is_hoisted(local.id) {
            return init.map(|value| LStmt::assign(name, value).with_origin(origin));
        }
        Some(LStmt::var(name, init).with_origin(origin))
    }

    /// `$current = value;` (used by the state machine for `yield return`)
    pub(super) fn set_current(&mut self, value: &Expr, span: Span) -> LStmt {
        let value = self.lower_expr(value);
        LStmt::assign(CURRENT_FIELD, value).with_origin(Origin::from_span(span))
    }
}
