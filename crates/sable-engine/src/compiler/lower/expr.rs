//! Expression lowering
//!
//! Expressions map one to one; the only work is naming locals and attaching
//! origins. References to locals carry the identifier the user wrote so the
//! source map can list it in its name table.

use super::Lowerer;
use crate::compiler::ir::{LExpr, LExprKind, Origin, TypeRef};
use crate::syntax::{Callee, Expr, ExprKind, TypeId};

impl<'a> Lowerer<'a> {
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> LExpr {
        let mut origin = Origin::from_span(expr.span);
        let kind = match &expr.kind {
            ExprKind::Literal(lit) => LExprKind::Literal(lit.clone()),
            ExprKind::Local(local) => {
                origin = Origin::named(expr.span, local.name.clone());
                LExprKind::Ident(self.local_name(local))
            }
            ExprKind::Assign { target, value } => {
                origin = Origin::named(expr.span, target.name.clone());
                LExprKind::Assign {
                    target: self.local_name(target),
                    value: Box::new(self.lower_expr(value)),
                }
            }
            ExprKind::Binary { op, left, right } => LExprKind::Binary {
                op: *op,
                left: Box::new(self.lower_expr(left)),
                right: Box::new(self.lower_expr(right)),
            },
            ExprKind::Unary { op, operand } => LExprKind::Unary {
                op: *op,
                operand: Box::new(self.lower_expr(operand)),
            },
            ExprKind::Call { callee, args } => {
                let args = self.lower_exprs(args);
                let callee = match callee {
                    Callee::Function(name) | Callee::Host(name) => {
                        origin = Origin::named(expr.span, name.clone());
                        LExpr::ident(name.clone())
                    }
                    Callee::Method { receiver, name } => LExpr::new(LExprKind::Member {
                        object: Box::new(self.lower_expr(receiver)),
                        name: name.clone(),
                    }),
                };
                LExprKind::Call {
                    callee: Box::new(callee),
                    args,
                }
            }
            ExprKind::New { ty, args } => LExprKind::New {
                ty: self.type_ref(*ty),
                args: self.lower_exprs(args),
            },
            ExprKind::Field { object, name } => LExprKind::Member {
                object: Box::new(self.lower_expr(object)),
                name: name.clone(),
            },
        };
        LExpr::new(kind).with_origin(origin)
    }

    pub(super) fn lower_exprs(&mut self, exprs: &[Expr]) -> Vec<LExpr> {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }

    pub(super) fn type_ref(&self, id: TypeId) -> TypeRef {
        TypeRef {
            id,
            name: self.unit.types.name(id),
        }
    }
}
