//! Resolved syntax tree nodes
//!
//! These nodes arrive fully bound and type checked. Lowering reads them and
//! builds new trees; nothing in the compiler mutates a node after the
//! semantic analyzer produced it.

use super::span::{SourceSet, Span};
use super::types::{TypeId, TypeTable};
use std::fmt;

/// Resolved identity of a local variable or parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local{}", self.0)
    }
}

/// A bound local: resolved identity plus the name the user wrote
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Local {
    pub id: LocalId,
    pub name: String,
}

impl Local {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: LocalId(id),
            name: name.into(),
        }
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operator text in the target language
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "===",
            BinaryOp::Ne => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Call target after overload resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// A function declared in the same compilation unit
    Function(String),
    /// A function provided by the host environment (base library, DOM, ...)
    Host(String),
    /// An instance method on a receiver value
    Method { receiver: Box<Expr>, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Local(Local),
    Assign { target: Local, value: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Call { callee: Callee, args: Vec<Expr> },
    /// Object construction; the first argument becomes the object's message
    New { ty: TypeId, args: Vec<Expr> },
    Field { object: Box<Expr>, name: String },
}

/// Expression (produces a value)
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Attach a source span
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// One `catch` clause, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Declared exception type; `None` catches everything
    pub ty: Option<TypeId>,
    /// Variable bound to the caught value
    pub local: Option<Local>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Vec<Stmt>,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Local { local: Local, init: Option<Expr> },
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, cond: Expr },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        local: Local,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    /// `throw e;`, or `throw;` (rethrow) when the value is absent
    Throw(Option<Expr>),
    Try(TryStmt),
    /// `yield return e;`
    YieldReturn(Expr),
    /// `yield break;`
    YieldBreak,
    /// `goto label;` (recognized by the analyzer, never lowered)
    Goto(String),
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Attach a source span
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// True if this statement, or any statement nested in it, is a
    /// `yield return` suspend point.
    pub fn contains_suspend(&self) -> bool {
        match &self.kind {
            StmtKind::YieldReturn(_) => true,
            StmtKind::Block(stmts) => stmts.iter().any(Stmt::contains_suspend),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.contains_suspend()
                    || else_branch.as_ref().is_some_and(|s| s.contains_suspend())
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::ForEach { body, .. } => body.contains_suspend(),
            StmtKind::For { init, body, .. } => {
                init.iter().any(Stmt::contains_suspend) || body.contains_suspend()
            }
            StmtKind::Try(t) => {
                t.body.iter().any(Stmt::contains_suspend)
                    || t.catches
                        .iter()
                        .any(|c| c.body.iter().any(Stmt::contains_suspend))
                    || t.finally
                        .as_ref()
                        .is_some_and(|f| f.iter().any(Stmt::contains_suspend))
            }
            _ => false,
        }
    }

    /// True if any `yield return` or `yield break` appears in this statement
    pub fn contains_yield(&self) -> bool {
        if matches!(self.kind, StmtKind::YieldBreak) {
            return true;
        }
        match &self.kind {
            StmtKind::Block(stmts) => stmts.iter().any(Stmt::contains_yield),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.contains_yield()
                    || else_branch.as_ref().is_some_and(|s| s.contains_yield())
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::ForEach { body, .. } => body.contains_yield(),
            StmtKind::For { init, body, .. } => {
                init.iter().any(Stmt::contains_yield) || body.contains_yield()
            }
            StmtKind::Try(t) => {
                t.body.iter().any(Stmt::contains_yield)
                    || t.catches
                        .iter()
                        .any(|c| c.body.iter().any(Stmt::contains_yield))
                    || t.finally
                        .as_ref()
                        .is_some_and(|f| f.iter().any(Stmt::contains_yield))
            }
            _ => self.contains_suspend(),
        }
    }
}

/// Which iterator interface an iterator function returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorKind {
    /// Returns a restartable sequence; each `getEnumerator()` starts fresh
    Enumerable,
    /// Returns a single enumerator
    Enumerator,
}

/// A function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Local>,
    pub body: Vec<Stmt>,
    /// Set by the analyzer when the declared return type is an iterator interface
    pub iterator: Option<IteratorKind>,
    pub span: Span,
}

/// Everything the core needs to compile one output unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    /// Name of the generated output file
    pub name: String,
    pub functions: Vec<FunctionDecl>,
    pub types: TypeTable,
    pub sources: SourceSet,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build::*;

    #[test]
    fn test_contains_suspend_sees_nested_yields() {
        let stmt = while_(
            boolean(true),
            block(vec![if_(boolean(true), yield_return(int(1)), None)]),
        );
        assert!(stmt.contains_suspend());
        assert!(stmt.contains_yield());
    }

    #[test]
    fn test_yield_break_is_not_a_suspend_point() {
        let stmt = block(vec![yield_break()]);
        assert!(!stmt.contains_suspend());
        assert!(stmt.contains_yield());
    }
}
