//! Syntax to lowered-tree lowering
//!
//! Converts the resolved syntax tree into the lowered representation. Plain
//! functions are lowered statement by statement; typed `try` statements go
//! through the exception engine ([`exception`]) and iterator functions are
//! rebuilt as state machines ([`iterator`]).
//!
//! Lowering never mutates its input. `foreach` loops are first rewritten into
//! new syntax trees ([`desugar`]) so both engines only see the enumerator
//! protocol spelled out.

mod control_flow;
mod desugar;
mod exception;
mod expr;
pub mod iterator;
mod stmt;

pub use control_flow::StateId;
pub use iterator::{HoistedLocal, IteratorStateDescriptor, RegionId, SuspendPoint, TryRegion};

use crate::compiler::diagnostic::LowerDiagnostic;
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::ir::{LFunction, LoweredUnit, Origin};
use crate::syntax::{Callee, CompilationUnit, Expr, ExprKind, FunctionDecl, Local, LocalId, Stmt, StmtKind};
use control_flow::LoopStack;
use iterator::machine::StateMachine;
use rustc_hash::{FxHashMap, FxHashSet};

/// Words a local may not be emitted as: the target's reserved words and the
/// globals the emitted code itself refers to
const SCRIPT_RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "Infinity", "instanceof", "interface",
    "let", "NaN", "new", "null", "package", "private", "protected", "public", "return", "static",
    "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
    "while", "with", "yield",
];

/// Everything lowering produced for one unit
#[derive(Debug, Clone)]
pub struct Lowering {
    pub unit: LoweredUnit,
    /// Recoverable findings, in the order they were found
    pub diagnostics: Vec<LowerDiagnostic>,
    /// One descriptor per iterator function, in declaration order
    pub iterators: Vec<IteratorStateDescriptor>,
}

/// Lowers one compilation unit
pub struct Lowerer<'a> {
    unit: &'a CompilationUnit,
    diagnostics: Vec<LowerDiagnostic>,
    iterators: Vec<IteratorStateDescriptor>,
    /// Emitted name of every local seen in the current function
    names: FxHashMap<LocalId, String>,
    /// Emitted names already taken in the current function
    used_names: FxHashSet<String>,
    /// Names no local may take: reserved words, unit functions, host
    /// functions and type names
    reserved: FxHashSet<String>,
    /// Counter for generated temporaries
    next_temp: u32,
    /// Temporaries bound by enclosing catch clauses, innermost last
    catch_temps: Vec<String>,
    loop_stack: LoopStack,
    /// State machine under construction while lowering an iterator body
    machine: Option<StateMachine>,
}

impl<'a> Lowerer<'a> {
    pub fn new(unit: &'a CompilationUnit) -> Self {
        Self {
            unit,
            diagnostics: Vec::new(),
            iterators: Vec::new(),
            names: FxHashMap::default(),
            used_names: FxHashSet::default(),
            reserved: reserved_names(unit),
            next_temp: 0,
            catch_temps: Vec::new(),
            loop_stack: LoopStack::new(),
            machine: None,
        }
    }

    /// Keep locals off an extra global name, such as the runtime helper object
    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.reserved.insert(name.into());
        self
    }

    pub fn lower_unit(mut self) -> CompileResult<Lowering> {
        let mut lowered = LoweredUnit::new(self.unit.name.clone(), self.unit.types.clone());
        for decl in &self.unit.functions {
            let function = self.lower_function(decl)?;
            lowered.add_function(function);
        }
        Ok(Lowering {
            unit: lowered,
            diagnostics: self.diagnostics,
            iterators: self.iterators,
        })
    }

    fn lower_function(&mut self, decl: &FunctionDecl) -> CompileResult<LFunction> {
        self.reset_function_state();
        let body = desugar::desugar_function(decl);

        let mut function = match decl.iterator {
            Some(kind) => self.lower_iterator(decl, kind, &body)?,
            None => {
                let params = decl.params.iter().map(|p| self.local_name(p)).collect();
                let body = self.lower_block(&body)?;
                LFunction::new(decl.name.clone(), params, body)
            }
        };
        function.origin = Origin::from_span(decl.span);

        tracing::debug!(
            function = %decl.name,
            iterator = decl.iterator.is_some(),
            statements = function.body.len(),
            "lowered function"
        );
        Ok(function)
    }

    fn reset_function_state(&mut self) {
        self.names.clear();
        self.used_names.clone_from(&self.reserved);
        self.next_temp = 0;
        self.catch_temps.clear();
        self.loop_stack.clear();
        self.machine = None;
    }

    /// Emitted name of a local, assigned on first sight. Shadowed or
    /// otherwise clashing names get a numeric suffix.
    pub(super) fn local_name(&mut self, local: &Local) -> String {
        if let Some(name) = self.names.get(&local.id) {
            return name.clone();
        }
        let mut candidate = local.name.clone();
        let mut suffix = 1;
        while self.used_names.contains(&candidate) {
            candidate = format!("{}_{}", local.name, suffix);
            suffix += 1;
        }
        self.used_names.insert(candidate.clone());
        self.names.insert(local.id, candidate.clone());
        candidate
    }

    /// A fresh `$`-prefixed temporary; source names never start with `$`
    pub(super) fn fresh_temp(&mut self, prefix: &str) -> String {
        self.next_temp += 1;
        format!("{}{}", prefix, self.next_temp)
    }

    pub(super) fn report(&mut self, diagnostic: LowerDiagnostic) {
        tracing::warn!(
            code = %diagnostic.code,
            line = diagnostic.span.line,
            column = diagnostic.span.column,
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    pub(super) fn is_hoisted(&self, id: LocalId) -> bool {
        self.machine
            .as_ref()
            .is_some_and(|m| m.hoisted.contains(&id))
    }

    pub(super) fn in_iterator(&self) -> bool {
        self.machine.is_some()
    }

    pub(super) fn machine_mut(&mut self) -> CompileResult<&mut StateMachine> {
        self.machine
            .as_mut()
            .ok_or_else(|| CompileError::internal("no iterator state machine is being built"))
    }
}

fn reserved_names(unit: &CompilationUnit) -> FxHashSet<String> {
    let mut names: FxHashSet<String> = SCRIPT_RESERVED.iter().map(|w| w.to_string()).collect();
    names.extend(unit.types.iter().map(|(_, info)| info.name.clone()));
    for f in &unit.functions {
        names.insert(f.name.clone());
        collect_host_names(&f.body, &mut names);
    }
    names
}

fn collect_host_names(stmts: &[Stmt], names: &mut FxHashSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Expr(e) | StmtKind::YieldReturn(e) => collect_expr_host_names(e, names),
            StmtKind::Local { init, .. } | StmtKind::Return(init) | StmtKind::Throw(init) => {
                if let Some(e) = init {
                    collect_expr_host_names(e, names);
                }
            }
            StmtKind::Block(body) => collect_host_names(body, names),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                collect_expr_host_names(cond, names);
                collect_host_names(std::slice::from_ref(then_branch.as_ref()), names);
                if let Some(e) = else_branch {
                    collect_host_names(std::slice::from_ref(e.as_ref()), names);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                collect_expr_host_names(cond, names);
                collect_host_names(std::slice::from_ref(body.as_ref()), names);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                collect_host_names(init, names);
                cond.iter()
                    .chain(update)
                    .for_each(|e| collect_expr_host_names(e, names));
                collect_host_names(std::slice::from_ref(body.as_ref()), names);
            }
            StmtKind::ForEach { iterable, body, .. } => {
                collect_expr_host_names(iterable, names);
                collect_host_names(std::slice::from_ref(body.as_ref()), names);
            }
            StmtKind::Try(t) => {
                collect_host_names(&t.body, names);
                for clause in &t.catches {
                    collect_host_names(&clause.body, names);
                }
                if let Some(finally) = &t.finally {
                    collect_host_names(finally, names);
                }
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::YieldBreak | StmtKind::Goto(_) => {}
        }
    }
}

fn collect_expr_host_names(expr: &Expr, names: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Local(_) => {}
        ExprKind::Assign { value, .. } => collect_expr_host_names(value, names),
        ExprKind::Binary { left, right, .. } => {
            collect_expr_host_names(left, names);
            collect_expr_host_names(right, names);
        }
        ExprKind::Unary { operand, .. } => collect_expr_host_names(operand, names),
        ExprKind::Call { callee, args } => {
            match callee {
                Callee::Host(name) => {
                    names.insert(name.clone());
                }
                Callee::Method { receiver, .. } => collect_expr_host_names(receiver, names),
                Callee::Function(_) => {}
            }
            args.iter().for_each(|a| collect_expr_host_names(a, names));
        }
        ExprKind::New { args, .. } => args.iter().for_each(|a| collect_expr_host_names(a, names)),
        ExprKind::Field { object, .. } => collect_expr_host_names(object, names),
    }
}
