//! Exception lowering
//!
//! The target has one untyped `catch`. A typed clause list becomes
//!
//! ```text
//! try { body }
//! catch ($t1) {
//!     if ($rt.isInstanceOf($t1, B)) { var b = $t1; ... }
//!     else if ($rt.isInstanceOf($t1, A)) { ... }
//!     else { throw $t1; }
//! }
//! finally { ... }
//! ```
//!
//! Tests run in source order and the first match wins; clauses are never
//! reordered by specificity. A clause is unreachable when an earlier clause
//! catches everything or names the same type. Unreachable clauses are
//! reported and still emitted. The finally body maps onto the native
//! `finally`, so it runs once on every exit path.

use super::control_flow::LoopContext;
use super::Lowerer;
use crate::compiler::diagnostic::{ErrorCode, LowerDiagnostic};
use crate::compiler::error::CompileResult;
use crate::compiler::ir::{
    ArmTest, CatchArm, CatchDispatch, CatchHandler, LExpr, LStmt, LStmtKind, Origin,
};
use crate::syntax::{CatchClause, Span, Stmt, TryStmt, TypeId};
use rustc_hash::FxHashMap;

impl<'a> Lowerer<'a> {
    pub(super) fn lower_try(&mut self, t: &TryStmt, span: Span) -> CompileResult<LStmt> {
        let body = self.lower_block(&t.body)?;
        let handler = self.lower_catch_clauses(&t.catches)?;
        let finalizer = match &t.finally {
            Some(f) => Some(self.lower_finally_body(f)?),
            None => None,
        };
        Ok(LStmt::new(LStmtKind::Try {
            body,
            handler,
            finalizer,
        })
        .with_origin(Origin::from_span(span)))
    }

    /// Lower a finally body. Jumps may not leave it and a bare `throw;`
    /// inside it has no caught value to refer to.
    pub(super) fn lower_finally_body(&mut self, stmts: &[Stmt]) -> CompileResult<Vec<LStmt>> {
        self.loop_stack.push(LoopContext::barrier());
        let saved = std::mem::take(&mut self.catch_temps);
        let result = self.lower_block(stmts);
        self.catch_temps = saved;
        self.loop_stack.pop();
        result
    }

    /// Build the single untyped handler for an ordered clause list
    pub(super) fn lower_catch_clauses(
        &mut self,
        catches: &[CatchClause],
    ) -> CompileResult<Option<CatchHandler>> {
        if catches.is_empty() {
            return Ok(None);
        }
        let reachable = self.check_reachability(catches);
        let subject = self.fresh_temp("$t");

        self.catch_temps.push(subject.clone());
        let arms: CompileResult<Vec<CatchArm>> = catches
            .iter()
            .zip(reachable)
            .map(|(clause, reachable)| self.lower_catch_arm(clause, &subject, reachable))
            .collect();
        self.catch_temps.pop();

        let dispatch = CatchDispatch {
            subject: subject.clone(),
            arms: arms?,
            rethrow: !catches.iter().any(|c| c.ty.is_none()),
        };
        Ok(Some(CatchHandler {
            binding: subject,
            body: vec![LStmt::new(LStmtKind::CatchDispatch(dispatch))],
        }))
    }

    fn lower_catch_arm(
        &mut self,
        clause: &CatchClause,
        subject: &str,
        reachable: bool,
    ) -> CompileResult<CatchArm> {
        let mut body = Vec::new();
        if let Some(local) = &clause.local {
            // Bind the declared variable to the caught value
            let name = self.local_name(local);
            let origin = Origin::named(clause.span, local.name.clone());
            if self.is_hoisted(local.id) {
                body.push(LStmt::assign(name, LExpr::ident(subject)).with_origin(origin));
            } else {
                body.push(LStmt::var(name, Some(LExpr::ident(subject))).with_origin(origin));
            }
        }
        body.extend(self.lower_block(&clause.body)?);

        let test = match clause.ty {
            Some(ty) => ArmTest::InstanceOf(self.type_ref(ty)),
            None => ArmTest::Always,
        };
        Ok(CatchArm {
            test,
            body,
            reachable,
            origin: Origin::from_span(clause.span),
        })
    }

    /// Order-based reachability: a clause after a catch-all, or naming a
    /// type an earlier clause already named, can never be selected.
    fn check_reachability(&mut self, catches: &[CatchClause]) -> Vec<bool> {
        let mut catch_all: Option<&CatchClause> = None;
        let mut seen: FxHashMap<TypeId, &CatchClause> = FxHashMap::default();
        let mut reachable = Vec::with_capacity(catches.len());

        for clause in catches {
            if let Some(earlier) = catch_all {
                let diagnostic = LowerDiagnostic::warning(
                    ErrorCode::UNREACHABLE_HANDLER,
                    format!(
                        "catch clause for {} is unreachable",
                        self.clause_subject(clause)
                    ),
                    clause.span,
                )
                .with_label("never selected")
                .with_related(earlier.span, "an earlier clause catches every exception")
                .with_note("the clause is still emitted but cannot run");
                self.report(diagnostic);
                reachable.push(false);
                continue;
            }
            match clause.ty {
                None => {
                    catch_all = Some(clause);
                    reachable.push(true);
                }
                Some(ty) => {
                    if let Some(earlier) = seen.get(&ty) {
                        let diagnostic = LowerDiagnostic::warning(
                            ErrorCode::DUPLICATE_HANDLER,
                            format!(
                                "duplicate catch clause for {}",
                                self.unit.types.name(ty)
                            ),
                            clause.span,
                        )
                        .with_label("never selected")
                        .with_related(earlier.span, "first clause for this type");
                        self.report(diagnostic);
                        reachable.push(false);
                    } else {
                        seen.insert(ty, clause);
                        reachable.push(true);
                    }
                }
            }
        }
        reachable
    }

    fn clause_subject(&self, clause: &CatchClause) -> String {
        match clause.ty {
            Some(ty) => format!("'{}'", self.unit.types.name(ty)),
            None => "all exceptions".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::diagnostic::ErrorCode;
    use crate::compiler::ir::{ArmTest, LStmtKind, PrettyPrint};
    use crate::compiler::lower::{Lowerer, Lowering};
    use crate::syntax::build::*;
    use crate::syntax::{CompilationUnit, FunctionDecl, Local, TypeTable};

    fn lower_with(types: TypeTable, decl: FunctionDecl) -> Lowering {
        let mut unit = CompilationUnit::new("t.js");
        unit.types = types;
        unit.functions.push(decl);
        Lowerer::new(&unit).lower_unit().unwrap()
    }

    #[test]
    fn test_clauses_keep_source_order_and_rethrow() {
        let mut types = TypeTable::new();
        let a = types.declare("A", None);
        let b = types.declare("B", None);
        let e = Local::new(0, "e");
        let lowering = lower_with(
            types,
            function(
                "f",
                vec![],
                vec![try_(
                    vec![throw(new_object(a, vec![]))],
                    vec![
                        catch_typed(b, Some(&e), vec![expr_stmt(host_call("trace", vec![int(1)]))]),
                        catch_typed(a, None, vec![expr_stmt(host_call("trace", vec![int(2)]))]),
                    ],
                    None,
                )],
            ),
        );
        assert!(lowering.diagnostics.is_empty());
        let text = lowering.unit.functions[0].pretty_print();
        assert_eq!(
            text,
            "function f() {\n  try {\n    throw new A();\n  } catch ($t1) {\n    if ($rt.isInstanceOf($t1, B)) {\n      var e = $t1;\n      trace(1);\n    } else if ($rt.isInstanceOf($t1, A)) {\n      trace(2);\n    } else {\n      throw $t1;\n    }\n  }\n}\n"
        );
    }

    #[test]
    fn test_catch_all_ends_the_chain() {
        let mut types = TypeTable::new();
        let a = types.declare("A", None);
        let lowering = lower_with(
            types,
            function(
                "f",
                vec![],
                vec![try_(
                    vec![],
                    vec![catch_typed(a, None, vec![]), catch_any(None, vec![])],
                    Some(vec![expr_stmt(host_call("trace", vec![int(0)]))]),
                )],
            ),
        );
        let text = lowering.unit.functions[0].pretty_print();
        assert!(text.contains("} else {\n    }\n  } finally {\n    trace(0);\n  }"));
        assert!(!text.contains("throw $t1"));
    }

    #[test]
    fn test_clause_after_catch_all_is_flagged_but_emitted() {
        let mut types = TypeTable::new();
        let a = types.declare("A", None);
        let lowering = lower_with(
            types,
            function(
                "f",
                vec![],
                vec![try_(
                    vec![],
                    vec![catch_any(None, vec![]), catch_typed(a, None, vec![])],
                    None,
                )],
            ),
        );
        assert_eq!(lowering.diagnostics.len(), 1);
        assert_eq!(lowering.diagnostics[0].code, ErrorCode::UNREACHABLE_HANDLER);
        assert!(lowering.diagnostics[0].message.contains("'A'"));

        let LStmtKind::Try { handler, .. } = &lowering.unit.functions[0].body[0].kind else {
            panic!("expected try");
        };
        let handler = handler.as_ref().unwrap();
        let LStmtKind::CatchDispatch(dispatch) = &handler.body[0].kind else {
            panic!("expected dispatch");
        };
        assert_eq!(dispatch.arms.len(), 2);
        assert_eq!(dispatch.arms[0].test, ArmTest::Always);
        assert!(!dispatch.arms[1].reachable);
        assert!(!dispatch.rethrow);
        let text = lowering.unit.functions[0].pretty_print();
        assert!(text.contains("// unreachable handler"));
    }

    #[test]
    fn test_duplicate_type_is_flagged() {
        let mut types = TypeTable::new();
        let a = types.declare("A", None);
        let lowering = lower_with(
            types,
            function(
                "f",
                vec![],
                vec![try_(
                    vec![],
                    vec![catch_typed(a, None, vec![]), catch_typed(a, None, vec![])],
                    None,
                )],
            ),
        );
        assert_eq!(lowering.diagnostics.len(), 1);
        assert_eq!(lowering.diagnostics[0].code, ErrorCode::DUPLICATE_HANDLER);
    }

    #[test]
    fn test_subtype_after_supertype_is_not_flagged() {
        // Reachability is order-based only; hierarchy is not consulted
        let mut types = TypeTable::new();
        let base = types.declare("Exception", None);
        let derived = types.declare("IoException", Some(base));
        let lowering = lower_with(
            types,
            function(
                "f",
                vec![],
                vec![try_(
                    vec![],
                    vec![catch_typed(base, None, vec![]), catch_typed(derived, None, vec![])],
                    None,
                )],
            ),
        );
        assert!(lowering.diagnostics.is_empty());
    }

    #[test]
    fn test_rethrow_uses_innermost_temp() {
        let mut types = TypeTable::new();
        let a = types.declare("A", None);
        let lowering = lower_with(
            types,
            function(
                "f",
                vec![],
                vec![try_(
                    vec![],
                    vec![catch_any(
                        None,
                        vec![try_(vec![], vec![catch_typed(a, None, vec![rethrow()])], None)],
                    )],
                    None,
                )],
            ),
        );
        let text = lowering.unit.functions[0].pretty_print();
        assert!(text.contains("catch ($t2)"));
        assert!(text.contains("if ($rt.isInstanceOf($t2, A)) {\n          throw $t2;"));
    }
}
