//! `foreach` desugaring
//!
//! ```text
//! foreach (x in e) body
//! ```
//! becomes
//! ```text
//! $e = e.getEnumerator();
//! try {
//!     while ($e.moveNext()) { x = $e.getCurrent(); body }
//! } finally {
//!     $e.dispose();
//! }
//! ```
//! The enumerator local gets a fresh id above every id in the function.
//! Leaving the loop by any path (including `break` or an exception) runs
//! `dispose`, which is what makes early termination of a lowered iterator
//! run its pending finally bodies.

use crate::syntax::{
    CatchClause, Callee, Expr, ExprKind, FunctionDecl, Local, LocalId, Span, Stmt, StmtKind,
    TryStmt,
};

const ENUMERATOR_NAME: &str = "$e";

/// Rewrite `decl`'s body with every `foreach` spelled out
pub(super) fn desugar_function(decl: &FunctionDecl) -> Vec<Stmt> {
    let mut max = decl.params.iter().map(|p| p.id.0).max();
    for stmt in &decl.body {
        max_local_in_stmt(stmt, &mut max);
    }
    let mut desugarer = Desugarer {
        next_local: max.map_or(0, |m| m + 1),
    };
    desugarer.stmts(&decl.body)
}

struct Desugarer {
    next_local: u32,
}

impl Desugarer {
    fn fresh_local(&mut self) -> Local {
        let id = self.next_local;
        self.next_local += 1;
        Local {
            id: LocalId(id),
            name: ENUMERATOR_NAME.to_string(),
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn boxed(&mut self, stmt: &Stmt) -> Box<Stmt> {
        Box::new(self.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Stmt {
        let kind = match &stmt.kind {
            StmtKind::Block(stmts) => StmtKind::Block(self.stmts(stmts)),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => StmtKind::If {
                cond: cond.clone(),
                then_branch: self.boxed(then_branch),
                else_branch: else_branch.as_ref().map(|s| self.boxed(s)),
            },
            StmtKind::While { cond, body } => StmtKind::While {
                cond: cond.clone(),
                body: self.boxed(body),
            },
            StmtKind::DoWhile { body, cond } => StmtKind::DoWhile {
                body: self.boxed(body),
                cond: cond.clone(),
            },
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => StmtKind::For {
                init: self.stmts(init),
                cond: cond.clone(),
                update: update.clone(),
                body: self.boxed(body),
            },
            StmtKind::Try(t) => StmtKind::Try(TryStmt {
                body: self.stmts(&t.body),
                catches: t
                    .catches
                    .iter()
                    .map(|c| CatchClause {
                        body: self.stmts(&c.body),
                        ..c.clone()
                    })
                    .collect(),
                finally: t.finally.as_ref().map(|f| self.stmts(f)),
            }),
            StmtKind::ForEach {
                local,
                iterable,
                body,
            } => return self.foreach(local, iterable, body, stmt.span),
            other => other.clone(),
        };
        Stmt::new(kind, stmt.span)
    }

    fn foreach(&mut self, local: &Local, iterable: &Expr, body: &Stmt, span: Span) -> Stmt {
        let enumerator = self.fresh_local();
        let synthetic = Span::default();
        let on_enumerator = |name: &str| {
            Expr::new(
                ExprKind::Call {
                    callee: Callee::Method {
                        receiver: Box::new(Expr::new(
                            ExprKind::Local(enumerator.clone()),
                            synthetic,
                        )),
                        name: name.to_string(),
                    },
                    args: Vec::new(),
                },
                synthetic,
            )
        };

        let get_enumerator = Expr::new(
            ExprKind::Call {
                callee: Callee::Method {
                    receiver: Box::new(iterable.clone()),
                    name: "getEnumerator".to_string(),
                },
                args: Vec::new(),
            },
            iterable.span,
        );
        let loop_body = Stmt::new(
            StmtKind::Block(vec![
                Stmt::new(
                    StmtKind::Local {
                        local: local.clone(),
                        init: Some(on_enumerator("getCurrent")),
                    },
                    span,
                ),
                self.stmt(body),
            ]),
            synthetic,
        );
        let loop_stmt = Stmt::new(
            StmtKind::While {
                cond: on_enumerator("moveNext"),
                body: Box::new(loop_body),
            },
            synthetic,
        );
        let dispose = Stmt::new(StmtKind::Expr(on_enumerator("dispose")), synthetic);

        Stmt::new(
            StmtKind::Block(vec![
                Stmt::new(
                    StmtKind::Local {
                        local: enumerator.clone(),
                        init: Some(get_enumerator),
                    },
                    span,
                ),
                Stmt::new(
                    StmtKind::Try(TryStmt {
                        body: vec![loop_stmt],
                        catches: Vec::new(),
                        finally: Some(vec![dispose]),
                    }),
                    synthetic,
                ),
            ]),
            span,
        )
    }
}

fn see(local: &Local, max: &mut Option<u32>) {
    *max = Some(max.map_or(local.id.0, |m| m.max(local.id.0)));
}

fn max_local_in_expr(expr: &Expr, max: &mut Option<u32>) {
    match &expr.kind {
        ExprKind::Literal(_) => {}
        ExprKind::Local(l) => see(l, max),
        ExprKind::Assign { target, value } => {
            see(target, max);
            max_local_in_expr(value, max);
        }
        ExprKind::Binary { left, right, .. } => {
            max_local_in_expr(left, max);
            max_local_in_expr(right, max);
        }
        ExprKind::Unary { operand, .. } => max_local_in_expr(operand, max),
        ExprKind::Call { callee, args } => {
            if let Callee::Method { receiver, .. } = callee {
                max_local_in_expr(receiver, max);
            }
            for arg in args {
                max_local_in_expr(arg, max);
            }
        }
        ExprKind::New { args, .. } => {
            for arg in args {
                max_local_in_expr(arg, max);
            }
        }
        ExprKind::Field { object, .. } => max_local_in_expr(object, max),
    }
}

fn max_local_in_stmt(stmt: &Stmt, max: &mut Option<u32>) {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::YieldReturn(e) | StmtKind::Throw(Some(e)) => {
            max_local_in_expr(e, max)
        }
        StmtKind::Return(Some(e)) => max_local_in_expr(e, max),
        StmtKind::Local { local, init } => {
            see(local, max);
            if let Some(init) = init {
                max_local_in_expr(init, max);
            }
        }
        StmtKind::Block(stmts) => stmts.iter().for_each(|s| max_local_in_stmt(s, max)),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            max_local_in_expr(cond, max);
            max_local_in_stmt(then_branch, max);
            if let Some(e) = else_branch {
                max_local_in_stmt(e, max);
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            max_local_in_expr(cond, max);
            max_local_in_stmt(body, max);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            init.iter().for_each(|s| max_local_in_stmt(s, max));
            if let Some(c) = cond {
                max_local_in_expr(c, max);
            }
            update.iter().for_each(|u| max_local_in_expr(u, max));
            max_local_in_stmt(body, max);
        }
        StmtKind::ForEach {
            local,
            iterable,
            body,
        } => {
            see(local, max);
            max_local_in_expr(iterable, max);
            max_local_in_stmt(body, max);
        }
        StmtKind::Try(t) => {
            t.body.iter().for_each(|s| max_local_in_stmt(s, max));
            for c in &t.catches {
                if let Some(l) = &c.local {
                    see(l, max);
                }
                c.body.iter().for_each(|s| max_local_in_stmt(s, max));
            }
            if let Some(f) = &t.finally {
                f.iter().for_each(|s| max_local_in_stmt(s, max));
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
