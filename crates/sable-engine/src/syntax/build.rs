//! Constructors for resolved syntax trees
//!
//! Upstream binders and tests build trees with these helpers. All nodes start
//! with a synthetic span; use `.at(span)` to attach a source position.

use super::node::*;
use super::span::Span;
use super::types::TypeId;

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::default())
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt::new(kind, Span::default())
}

// ============================================================================
// Expressions
// ============================================================================

pub fn null() -> Expr {
    expr(ExprKind::Literal(Literal::Null))
}

pub fn boolean(value: bool) -> Expr {
    expr(ExprKind::Literal(Literal::Bool(value)))
}

pub fn int(value: i64) -> Expr {
    expr(ExprKind::Literal(Literal::Int(value)))
}

pub fn float(value: f64) -> Expr {
    expr(ExprKind::Literal(Literal::Float(value)))
}

pub fn string(value: &str) -> Expr {
    expr(ExprKind::Literal(Literal::Str(value.to_string())))
}

pub fn local(l: &Local) -> Expr {
    expr(ExprKind::Local(l.clone()))
}

pub fn assign(target: &Local, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        target: target.clone(),
        value: Box::new(value),
    })
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    expr(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn add(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Add, left, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Lt, left, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Eq, left, right)
}

pub fn not(operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        op: UnaryOp::Not,
        operand: Box::new(operand),
    })
}

pub fn neg(operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        op: UnaryOp::Neg,
        operand: Box::new(operand),
    })
}

/// `target = target + 1`
pub fn increment(target: &Local) -> Expr {
    assign(target, add(local(target), int(1)))
}

pub fn call(function: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Callee::Function(function.to_string()),
        args,
    })
}

pub fn host_call(function: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Callee::Host(function.to_string()),
        args,
    })
}

pub fn method_call(receiver: Expr, name: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Callee::Method {
            receiver: Box::new(receiver),
            name: name.to_string(),
        },
        args,
    })
}

pub fn new_object(ty: TypeId, args: Vec<Expr>) -> Expr {
    expr(ExprKind::New { ty, args })
}

pub fn field(object: Expr, name: &str) -> Expr {
    expr(ExprKind::Field {
        object: Box::new(object),
        name: name.to_string(),
    })
}

// ============================================================================
// Statements
// ============================================================================

pub fn expr_stmt(e: Expr) -> Stmt {
    let span = e.span;
    Stmt::new(StmtKind::Expr(e), span)
}

pub fn let_(l: &Local, init: Expr) -> Stmt {
    stmt(StmtKind::Local {
        local: l.clone(),
        init: Some(init),
    })
}

pub fn declare(l: &Local) -> Stmt {
    stmt(StmtKind::Local {
        local: l.clone(),
        init: None,
    })
}

pub fn block(stmts: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Block(stmts))
}

pub fn if_(cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
    stmt(StmtKind::If {
        cond,
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn while_(cond: Expr, body: Stmt) -> Stmt {
    stmt(StmtKind::While {
        cond,
        body: Box::new(body),
    })
}

pub fn do_while(body: Stmt, cond: Expr) -> Stmt {
    stmt(StmtKind::DoWhile {
        body: Box::new(body),
        cond,
    })
}

pub fn for_(init: Vec<Stmt>, cond: Option<Expr>, update: Vec<Expr>, body: Stmt) -> Stmt {
    stmt(StmtKind::For {
        init,
        cond,
        update,
        body: Box::new(body),
    })
}

pub fn foreach(l: &Local, iterable: Expr, body: Stmt) -> Stmt {
    stmt(StmtKind::ForEach {
        local: l.clone(),
        iterable,
        body: Box::new(body),
    })
}

pub fn break_() -> Stmt {
    stmt(StmtKind::Break)
}

pub fn continue_() -> Stmt {
    stmt(StmtKind::Continue)
}

pub fn return_(value: Option<Expr>) -> Stmt {
    stmt(StmtKind::Return(value))
}

pub fn throw(value: Expr) -> Stmt {
    stmt(StmtKind::Throw(Some(value)))
}

pub fn rethrow() -> Stmt {
    stmt(StmtKind::Throw(None))
}

pub fn try_(body: Vec<Stmt>, catches: Vec<CatchClause>, finally: Option<Vec<Stmt>>) -> Stmt {
    stmt(StmtKind::Try(TryStmt {
        body,
        catches,
        finally,
    }))
}

/// `catch (T local) { body }`
pub fn catch_typed(ty: TypeId, l: Option<&Local>, body: Vec<Stmt>) -> CatchClause {
    CatchClause {
        ty: Some(ty),
        local: l.cloned(),
        body,
        span: Span::default(),
    }
}

/// `catch { body }`
pub fn catch_any(l: Option<&Local>, body: Vec<Stmt>) -> CatchClause {
    CatchClause {
        ty: None,
        local: l.cloned(),
        body,
        span: Span::default(),
    }
}

pub fn yield_return(value: Expr) -> Stmt {
    stmt(StmtKind::YieldReturn(value))
}

pub fn yield_break() -> Stmt {
    stmt(StmtKind::YieldBreak)
}

pub fn goto(label: &str) -> Stmt {
    stmt(StmtKind::Goto(label.to_string()))
}

// ============================================================================
// Declarations
// ============================================================================

pub fn function(name: &str, params: Vec<Local>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params,
        body,
        iterator: None,
        span: Span::default(),
    }
}

pub fn iterator(name: &str, params: Vec<Local>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        iterator: Some(IteratorKind::Enumerable),
        ..function(name, params, body)
    }
}

pub fn enumerator(name: &str, params: Vec<Local>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        iterator: Some(IteratorKind::Enumerator),
        ..function(name, params, body)
    }
}
