//! Lowered expressions

use super::origin::Origin;
use super::stmt::LStmt;
use crate::syntax::{BinaryOp, Literal, TypeId, UnaryOp};
use std::sync::Arc;

/// A resolved type as it appears in target code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub id: TypeId,
    pub name: String,
}

/// Helpers the target runtime object provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeHelper {
    /// `makeEnumerable(factory)`: wraps an enumerator factory as a sequence
    MakeEnumerable,
    /// `makeEnumerator(moveNext, getCurrent, dispose)`
    MakeEnumerator,
}

impl RuntimeHelper {
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeHelper::MakeEnumerable => "makeEnumerable",
            RuntimeHelper::MakeEnumerator => "makeEnumerator",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LExprKind {
    Literal(Literal),
    Ident(String),
    Assign {
        target: String,
        value: Box<LExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<LExpr>,
        right: Box<LExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<LExpr>,
    },
    Call {
        callee: Box<LExpr>,
        args: Vec<LExpr>,
    },
    Member {
        object: Box<LExpr>,
        name: String,
    },
    New {
        ty: TypeRef,
        args: Vec<LExpr>,
    },
    /// Closure expression
    Function {
        params: Vec<String>,
        body: Arc<[LStmt]>,
    },
    Runtime {
        helper: RuntimeHelper,
        args: Vec<LExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LExpr {
    pub kind: LExprKind,
    pub origin: Option<Origin>,
}

impl LExpr {
    pub fn new(kind: LExprKind) -> Self {
        Self { kind, origin: None }
    }

    pub fn with_origin(mut self, origin: Option<Origin>) -> Self {
        self.origin = origin;
        self
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(LExprKind::Ident(name.into()))
    }

    pub fn int(value: i64) -> Self {
        Self::new(LExprKind::Literal(Literal::Int(value)))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(LExprKind::Literal(Literal::Bool(value)))
    }

    pub fn null() -> Self {
        Self::new(LExprKind::Literal(Literal::Null))
    }

    pub fn assign(target: impl Into<String>, value: LExpr) -> Self {
        Self::new(LExprKind::Assign {
            target: target.into(),
            value: Box::new(value),
        })
    }

    pub fn not(operand: LExpr) -> Self {
        Self::new(LExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    pub fn call(callee: LExpr, args: Vec<LExpr>) -> Self {
        Self::new(LExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    /// `object.name(args)`
    pub fn method_call(object: LExpr, name: impl Into<String>, args: Vec<LExpr>) -> Self {
        Self::call(
            Self::new(LExprKind::Member {
                object: Box::new(object),
                name: name.into(),
            }),
            args,
        )
    }

    pub fn function(params: Vec<String>, body: Vec<LStmt>) -> Self {
        Self::new(LExprKind::Function {
            params,
            body: body.into(),
        })
    }

    pub fn runtime(helper: RuntimeHelper, args: Vec<LExpr>) -> Self {
        Self::new(LExprKind::Runtime { helper, args })
    }
}
