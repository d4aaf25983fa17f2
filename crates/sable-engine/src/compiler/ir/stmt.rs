//! Lowered statements
//!
//! The reduced statement set the target can express directly: one untyped
//! `catch`, labelled loops with `break`/`continue` for jumps, and `switch` on
//! an integer state field. Typed catch dispatch is an explicit ordered arm
//! list ([`CatchDispatch`]) rendered as an `if`/`else` chain.

use super::expr::{LExpr, TypeRef};
use super::origin::Origin;

/// One `case` of a switch; several values may share a body
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub values: Vec<i64>,
    pub body: Vec<LStmt>,
}

/// Native untyped catch: binds the thrown value to `binding`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchHandler {
    pub binding: String,
    pub body: Vec<LStmt>,
}

/// Predicate of one dispatch arm
#[derive(Debug, Clone, PartialEq)]
pub enum ArmTest {
    /// Catch-all clause
    Always,
    /// Runtime type test against a declared exception type
    InstanceOf(TypeRef),
}

/// One (predicate, handler) pair of a typed catch chain
#[derive(Debug, Clone, PartialEq)]
pub struct CatchArm {
    pub test: ArmTest,
    pub body: Vec<LStmt>,
    /// False for clauses shadowed by an earlier clause; they are still emitted
    pub reachable: bool,
    pub origin: Option<Origin>,
}

/// Ordered runtime type tests over a caught value, first match wins
#[derive(Debug, Clone, PartialEq)]
pub struct CatchDispatch {
    /// Temporary holding the caught value
    pub subject: String,
    pub arms: Vec<CatchArm>,
    /// Whether a trailing `else { throw subject; }` arm is needed
    pub rethrow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LStmtKind {
    Expr(LExpr),
    Var {
        name: String,
        init: Option<LExpr>,
    },
    Block(Vec<LStmt>),
    If {
        cond: LExpr,
        then_branch: Vec<LStmt>,
        else_branch: Option<Vec<LStmt>>,
    },
    While {
        label: Option<String>,
        cond: LExpr,
        body: Vec<LStmt>,
    },
    DoWhile {
        label: Option<String>,
        body: Vec<LStmt>,
        cond: LExpr,
    },
    /// `for (; cond; update) body`
    For {
        label: Option<String>,
        cond: Option<LExpr>,
        update: Vec<LExpr>,
        body: Vec<LStmt>,
    },
    Switch {
        subject: LExpr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<LStmt>>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<LExpr>),
    Throw(LExpr),
    Try {
        body: Vec<LStmt>,
        handler: Option<CatchHandler>,
        finalizer: Option<Vec<LStmt>>,
    },
    CatchDispatch(CatchDispatch),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LStmt {
    pub kind: LStmtKind,
    pub origin: Option<Origin>,
}

impl LStmt {
    pub fn new(kind: LStmtKind) -> Self {
        Self { kind, origin: None }
    }

    pub fn with_origin(mut self, origin: Option<Origin>) -> Self {
        self.origin = origin;
        self
    }

    pub fn expr(e: LExpr) -> Self {
        Self::new(LStmtKind::Expr(e))
    }

    pub fn var(name: impl Into<String>, init: Option<LExpr>) -> Self {
        Self::new(LStmtKind::Var {
            name: name.into(),
            init,
        })
    }

    /// `target = value;`
    pub fn assign(target: impl Into<String>, value: LExpr) -> Self {
        Self::expr(LExpr::assign(target, value))
    }

    pub fn ret(value: Option<LExpr>) -> Self {
        Self::new(LStmtKind::Return(value))
    }

    pub fn throw(value: LExpr) -> Self {
        Self::new(LStmtKind::Throw(value))
    }

    pub fn break_to(label: Option<String>) -> Self {
        Self::new(LStmtKind::Break(label))
    }

    pub fn continue_to(label: Option<String>) -> Self {
        Self::new(LStmtKind::Continue(label))
    }

    pub fn if_(cond: LExpr, then_branch: Vec<LStmt>, else_branch: Option<Vec<LStmt>>) -> Self {
        Self::new(LStmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    /// True if control never falls through to the next statement
    pub fn is_jump(&self) -> bool {
        matches!(
            self.kind,
            LStmtKind::Break(_)
                | LStmtKind::Continue(_)
                | LStmtKind::Return(_)
                | LStmtKind::Throw(_)
        )
    }
}
