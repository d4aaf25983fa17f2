//! Iterator lowering
//!
//! An iterator function (`yield return` / `yield break`) becomes a function
//! returning an enumerator object built by the runtime from three closures:
//!
//! ```text
//! function range(n) {
//!     var $state = 0;
//!     var $current = null;
//!     var i;
//!     return $rt.makeEnumerator(
//!         function() { /* moveNext: the state machine */ },
//!         function() { return $current; },
//!         function() { /* dispose: run owed finally bodies */ });
//! }
//! ```
//!
//! Nothing in the body runs until the first `moveNext`. For an enumerable
//! iterator the enumerator construction is wrapped in a factory passed to
//! `$rt.makeEnumerable`, so every `getEnumerator()` starts a new machine with
//! its own copy of the arguments.
//!
//! The work is split in three passes:
//! - [`analysis`] validates the body and finds locals that live across a
//!   suspend point,
//! - [`machine`] cuts the body into states,
//! - this module assembles the closures and the dispose table and records an
//!   [`IteratorStateDescriptor`].

mod analysis;
pub(crate) mod machine;

use super::{Lowerer, StateId};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::ir::{LExpr, LFunction, LStmt, LStmtKind, RuntimeHelper, SwitchCase};
use crate::syntax::{FunctionDecl, IteratorKind, LocalId, Span, Stmt};
use machine::{StateMachine, CURRENT_FIELD, DO_FINALLY, FINISHED, STATE_FIELD};
use std::fmt::Write as _;

/// Index of a try region within one iterator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);

/// A `try` statement whose body contains a suspend point
#[derive(Debug, Clone, PartialEq)]
pub struct TryRegion {
    pub id: RegionId,
    /// Innermost enclosing region
    pub parent: Option<RegionId>,
    /// Function holding the finally body, if the try has one
    pub finally_function: Option<String>,
    /// Every state whose code runs inside the region
    pub states: Vec<StateId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuspendPoint {
    /// State `moveNext` resumes at after this point
    pub resume_state: StateId,
    /// Locals whose values must survive the suspension
    pub live: Vec<LocalId>,
    /// Regions active at the suspension, outermost first
    pub active_regions: Vec<RegionId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoistedLocal {
    pub id: LocalId,
    /// Emitted name
    pub name: String,
    pub parameter: bool,
}

/// What the iterator engine decided for one iterator function
#[derive(Debug, Clone, PartialEq)]
pub struct IteratorStateDescriptor {
    pub function: String,
    pub kind: IteratorKind,
    pub hoisted: Vec<HoistedLocal>,
    /// In source order
    pub suspend_points: Vec<SuspendPoint>,
    pub regions: Vec<TryRegion>,
    pub state_count: usize,
}

impl IteratorStateDescriptor {
    pub fn suspend_point(&self, state: StateId) -> Option<&SuspendPoint> {
        self.suspend_points.iter().find(|p| p.resume_state == state)
    }

    pub fn region(&self, id: RegionId) -> Option<&TryRegion> {
        self.regions.get(id.0 as usize)
    }

    /// Finally functions `dispose` must run when the machine sits at
    /// `state`, innermost first
    pub fn finally_owed(&self, state: StateId) -> Vec<String> {
        let Some(point) = self.suspend_point(state) else {
            return Vec::new();
        };
        point
            .active_regions
            .iter()
            .rev()
            .filter_map(|id| self.region(*id))
            .filter_map(|r| r.finally_function.clone())
            .collect()
    }

    /// Human-readable dump used in debug output
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let kind = match self.kind {
            IteratorKind::Enumerable => "enumerable",
            IteratorKind::Enumerator => "enumerator",
        };
        let _ = writeln!(out, "iterator {} ({}, {} states)", self.function, kind, self.state_count);

        let hoisted: Vec<String> = self
            .hoisted
            .iter()
            .map(|h| {
                if h.parameter {
                    format!("{} (param)", h.name)
                } else {
                    h.name.clone()
                }
            })
            .collect();
        let _ = writeln!(out, "  hoisted: {}", hoisted.join(", "));

        for region in &self.regions {
            let _ = write!(out, "  region {}: states {:?}", region.id.0, region.states);
            if let Some(parent) = region.parent {
                let _ = write!(out, " in region {}", parent.0);
            }
            if let Some(f) = &region.finally_function {
                let _ = write!(out, " finally {}", f);
            }
            out.push('\n');
        }

        for point in &self.suspend_points {
            let live: Vec<String> = point
                .live
                .iter()
                .map(|id| {
                    self.hoisted
                        .iter()
                        .find(|h| h.id == *id)
                        .map_or_else(|| id.to_string(), |h| h.name.clone())
                })
                .collect();
            let regions: Vec<u32> = point.active_regions.iter().map(|r| r.0).collect();
            let _ = writeln!(
                out,
                "  suspend -> {} at {}:{} live [{}] regions {:?}",
                point.resume_state,
                point.span.line,
                point.span.column,
                live.join(", "),
                regions
            );
        }
        out
    }
}

impl<'a> Lowerer<'a> {
    pub(super) fn lower_iterator(
        &mut self,
        decl: &FunctionDecl,
        kind: IteratorKind,
        body: &[Stmt],
    ) -> CompileResult<LFunction> {
        let analysis = analysis::analyze(&decl.params, body)?;

        // Name parameters and hoisted locals before anything else is lowered
        let params: Vec<String> = decl.params.iter().map(|p| self.local_name(p)).collect();
        let hoisted: Vec<HoistedLocal> = analysis
            .hoisted
            .iter()
            .map(|local| HoistedLocal {
                id: local.id,
                name: self.local_name(local),
                parameter: decl.params.iter().any(|p| p.id == local.id),
            })
            .collect();

        self.machine = Some(StateMachine::new(
            analysis.hoisted_ids(),
            analysis.live_at_suspend,
        ));
        let dispatch = self.build_state_machine(body);
        let machine = self
            .machine
            .take()
            .ok_or_else(|| CompileError::internal("iterator state machine vanished"))?;
        let dispatch = dispatch?;

        let descriptor = IteratorStateDescriptor {
            function: decl.name.clone(),
            kind,
            hoisted,
            suspend_points: machine.suspend_points.clone(),
            regions: machine.regions.clone(),
            state_count: machine.state_count(),
        };

        let mut move_next = Vec::new();
        if machine.uses_do_finally {
            move_next.push(LStmt::var(DO_FINALLY, Some(LExpr::boolean(true))));
        }
        move_next.push(dispatch);
        move_next.push(LStmt::ret(Some(LExpr::boolean(false))));

        let get_current = vec![LStmt::ret(Some(LExpr::ident(CURRENT_FIELD)))];
        let dispose = dispose_body(&descriptor);

        let mut factory = vec![
            LStmt::var(STATE_FIELD, Some(LExpr::int(0))),
            LStmt::var(CURRENT_FIELD, Some(LExpr::null())),
        ];
        if kind == IteratorKind::Enumerable {
            for name in &params {
                factory.push(LStmt::var(name.clone(), Some(LExpr::ident(copied_param(name)))));
            }
        }
        for local in descriptor.hoisted.iter().filter(|h| !h.parameter) {
            factory.push(LStmt::var(local.name.clone(), None));
        }
        for (name, body) in machine.finally_functions {
            factory.push(LStmt::var(name, Some(LExpr::function(Vec::new(), body))));
        }
        factory.push(LStmt::ret(Some(LExpr::runtime(
            RuntimeHelper::MakeEnumerator,
            vec![
                LExpr::function(Vec::new(), move_next),
                LExpr::function(Vec::new(), get_current),
                LExpr::function(Vec::new(), dispose),
            ],
        ))));

        let function = match kind {
            IteratorKind::Enumerable => LFunction::new(
                decl.name.clone(),
                params.iter().map(|p| copied_param(p)).collect(),
                vec![LStmt::ret(Some(LExpr::runtime(
                    RuntimeHelper::MakeEnumerable,
                    vec![LExpr::function(Vec::new(), factory)],
                )))],
            ),
            IteratorKind::Enumerator => LFunction::new(decl.name.clone(), params, factory),
        };

        tracing::debug!(
            function = %decl.name,
            states = descriptor.state_count,
            hoisted = descriptor.hoisted.len(),
            regions = descriptor.regions.len(),
            suspend_points = descriptor.suspend_points.len(),
            "built iterator state machine"
        );
        self.iterators.push(descriptor);
        Ok(function)
    }
}

/// Outer parameter name of an enumerable iterator; each enumerator copies it
fn copied_param(name: &str) -> String {
    format!("$p_{}", name)
}

/// `dispose`: run the finally bodies owed at the current resume state, then
/// mark the machine finished. A second call finds `$state == -1` and does
/// nothing.
fn dispose_body(descriptor: &IteratorStateDescriptor) -> Vec<LStmt> {
    let finished = LStmt::assign(STATE_FIELD, LExpr::int(FINISHED));

    // States owing the same finally chain share one case
    let mut groups: Vec<(Vec<String>, Vec<StateId>)> = Vec::new();
    for point in &descriptor.suspend_points {
        let owed = descriptor.finally_owed(point.resume_state);
        if owed.is_empty() {
            continue;
        }
        match groups.iter_mut().find(|(chain, _)| *chain == owed) {
            Some((_, states)) => states.push(point.resume_state),
            None => groups.push((owed, vec![point.resume_state])),
        }
    }
    if groups.is_empty() {
        return vec![finished];
    }

    let cases = groups
        .into_iter()
        .map(|(chain, values)| {
            let mut body = run_finally_chain(&chain);
            body.push(LStmt::break_to(None));
            SwitchCase { values, body }
        })
        .collect();
    vec![LStmt::new(LStmtKind::Try {
        body: vec![LStmt::new(LStmtKind::Switch {
            subject: LExpr::ident(STATE_FIELD),
            cases,
            default: None,
        })],
        handler: None,
        finalizer: Some(vec![finished]),
    })]
}

/// Innermost first; an outer finally still runs if an inner one throws
fn run_finally_chain(chain: &[String]) -> Vec<LStmt> {
    let call = |name: &str| LStmt::expr(LExpr::call(LExpr::ident(name), Vec::new()));
    let mut stmts = Vec::new();
    for (i, name) in chain.iter().enumerate() {
        if i == 0 {
            stmts.push(call(name));
        } else {
            stmts = vec![LStmt::new(LStmtKind::Try {
                body: stmts,
                handler: None,
                finalizer: Some(vec![call(name)]),
            })];
        }
    }
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::PrettyPrint;
    use crate::compiler::lower::Lowering;
    use crate::syntax::build::*;
    use crate::syntax::{CompilationUnit, Local, SourceId};

    fn lower(decl: FunctionDecl) -> Lowering {
        let mut unit = CompilationUnit::new("t.js");
        unit.functions.push(decl);
        Lowerer::new(&unit).lower_unit().unwrap()
    }

    #[test]
    fn test_sequential_yields_get_one_state_each() {
        let lowering = lower(enumerator(
            "pair",
            vec![],
            vec![yield_return(int(1)), yield_return(int(2))],
        ));
        let descriptor = &lowering.iterators[0];
        assert_eq!(descriptor.state_count, 3);
        let resume: Vec<StateId> = descriptor.suspend_points.iter().map(|p| p.resume_state).collect();
        assert_eq!(resume, vec![1, 2]);

        let text = lowering.unit.functions[0].pretty_print();
        assert!(text.starts_with("function pair() {\n  var $state = 0;\n  var $current = null;\n"));
        assert!(text.contains("return $rt.makeEnumerator(function() {"));
        assert!(text.contains("$sm0: for (;;) {"));
        assert!(text.contains("case 1: {"));
        assert!(text.contains("$current = 2;"));
        assert!(text.contains("break $sm0;"));
        // No region, so dispose only marks the machine finished
        assert!(!text.contains("$doFinally"));
    }

    #[test]
    fn test_enumerable_copies_parameters_per_enumerator() {
        let n = Local::new(0, "n");
        let lowering = lower(iterator("count", vec![n.clone()], vec![yield_return(local(&n))]));
        let f = &lowering.unit.functions[0];
        assert_eq!(f.params, vec!["$p_n".to_string()]);
        let text = f.pretty_print();
        assert!(text.contains("return $rt.makeEnumerable(function() {"));
        assert!(text.contains("var n = $p_n;"));

        let hoisted = &lowering.iterators[0].hoisted;
        assert_eq!(hoisted.len(), 1);
        assert!(hoisted[0].parameter);
    }

    #[test]
    fn test_region_finally_is_owed_only_inside_region() {
        let lowering = lower(enumerator(
            "guarded",
            vec![],
            vec![
                try_(
                    vec![yield_return(int(1))],
                    vec![],
                    Some(vec![expr_stmt(host_call("trace", vec![string("cleanup")]))]),
                ),
                yield_return(int(2)),
            ],
        ));
        let descriptor = &lowering.iterators[0];
        assert_eq!(descriptor.regions.len(), 1);
        let first = descriptor.suspend_points[0].resume_state;
        let second = descriptor.suspend_points[1].resume_state;
        assert_eq!(descriptor.finally_owed(first), vec!["$finally1".to_string()]);
        assert!(descriptor.finally_owed(second).is_empty());
        assert!(descriptor.regions[0].states.contains(&descriptor.suspend_points[0].resume_state));

        let text = lowering.unit.functions[0].pretty_print();
        assert!(text.contains("var $finally1 = function() {"));
        assert!(text.contains("var $doFinally = true;"));
        assert!(text.contains("$doFinally = false;"));
        assert!(text.contains("if ($doFinally) {"));
        assert!(text.contains("$sm1: for (;;) {"));
    }

    #[test]
    fn test_nested_regions_owe_innermost_first() {
        let lowering = lower(enumerator(
            "nested",
            vec![],
            vec![try_(
                vec![try_(
                    vec![yield_return(int(1))],
                    vec![],
                    Some(vec![expr_stmt(host_call("trace", vec![string("inner")]))]),
                )],
                vec![],
                Some(vec![expr_stmt(host_call("trace", vec![string("outer")]))]),
            )],
        ));
        let descriptor = &lowering.iterators[0];
        let state = descriptor.suspend_points[0].resume_state;
        assert_eq!(
            descriptor.finally_owed(state),
            vec!["$finally2".to_string(), "$finally1".to_string()]
        );
        assert_eq!(descriptor.regions[1].parent, Some(RegionId(0)));
        let text = lowering.unit.functions[0].pretty_print();
        assert!(text.contains("$finally2();\n"));
    }

    #[test]
    fn test_describe_lists_live_locals() {
        let i = Local::new(0, "i");
        let lowering = lower(enumerator(
            "walk",
            vec![],
            vec![
                let_(&i, int(0)),
                yield_return(local(&i)).at(Span::at(SourceId(0), 3, 5)),
            ],
        ));
        let text = lowering.iterators[0].describe();
        assert!(text.starts_with("iterator walk (enumerator, 2 states)\n"));
        assert!(text.contains("  hoisted: i\n"));
        assert!(text.contains("  suspend -> 1 at 3:5 live [i] regions []\n"));
    }

    #[test]
    fn test_hoisted_declaration_becomes_assignment() {
        let i = Local::new(0, "i");
        let lowering = lower(enumerator(
            "walk",
            vec![],
            vec![let_(&i, int(7)), yield_return(local(&i))],
        ));
        let text = lowering.unit.functions[0].pretty_print();
        assert!(text.contains("var i;\n"));
        assert!(text.contains("i = 7;\n"));
        assert!(!text.contains("var i = 7;"));
    }

    #[test]
    fn test_unsupported_yield_in_catch_aborts_unit() {
        let mut unit = CompilationUnit::new("t.js");
        unit.functions.push(enumerator(
            "bad",
            vec![],
            vec![try_(vec![], vec![catch_any(None, vec![yield_return(int(1))])], None)],
        ));
        let err = Lowerer::new(&unit).lower_unit().unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }
}
