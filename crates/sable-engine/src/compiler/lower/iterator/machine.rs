//! State machine construction
//!
//! An iterator body is cut at every `yield return` into numbered states.
//! Each state becomes one `case` of a `switch ($state)` inside a labelled
//! `for (;;)`:
//!
//! ```text
//! $sm0: for (;;) {
//!     switch ($state) {
//!         case 0: { $state = -1; ...; $current = x; $state = 1; return true; }
//!         case 1: { $state = -1; ...; $state = 2; continue $sm0; }
//!         default: { break $sm0; }
//!     }
//! }
//! ```
//!
//! Entering a case resets `$state` to -1 so an exception escaping `moveNext`
//! leaves the machine finished. Control moves between states by assigning
//! `$state` and continuing the loop that owns the target state.
//!
//! A `try` whose body suspends (a region) gets its own frame: a nested
//! labelled loop wrapped in the native `try`. The parent frame owns one case
//! listing every state inside the region, so resuming re-enters the `try`
//! before dispatching. A region's finally body is moved into a
//! `$finallyN` function shared by the native `finally` (guarded by
//! `$doFinally`, which a suspend clears) and by `dispose`.

use super::super::control_flow::LoopContext;
use super::super::Lowerer;
use super::{RegionId, SuspendPoint, TryRegion};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::ir::{LExpr, LStmt, LStmtKind, Origin, SwitchCase};
use crate::compiler::lower::StateId;
use crate::syntax::{Expr, LocalId, Span, Stmt, StmtKind, TryStmt};
use rustc_hash::FxHashSet;

/// Resume point field
pub(crate) const STATE_FIELD: &str = "$state";
/// Value reported by `getCurrent`
pub(crate) const CURRENT_FIELD: &str = "$current";
/// Cleared by a suspend so region finally bodies do not run on the way out
pub(crate) const DO_FINALLY: &str = "$doFinally";
/// `$state` of a finished (or running) machine
pub(crate) const FINISHED: StateId = -1;

/// One labelled dispatch loop
#[derive(Debug)]
struct Frame {
    label: String,
    parent: Option<usize>,
    cases: Vec<SwitchCase>,
}

#[derive(Debug)]
pub(crate) struct StateMachine {
    /// Locals stored in the enumerator closure rather than `moveNext`
    pub(crate) hoisted: FxHashSet<LocalId>,
    frames: Vec<Frame>,
    frame: usize,
    /// Owning frame of every allocated state, indexed by state id
    state_frames: Vec<usize>,
    state: StateId,
    body: Vec<LStmt>,
    pub(super) regions: Vec<TryRegion>,
    region_stack: Vec<RegionId>,
    pub(super) suspend_points: Vec<SuspendPoint>,
    live_at_suspend: Vec<Vec<LocalId>>,
    pub(super) finally_functions: Vec<(String, Vec<LStmt>)>,
    pub(super) uses_do_finally: bool,
}

impl StateMachine {
    pub(crate) fn new(hoisted: FxHashSet<LocalId>, live_at_suspend: Vec<Vec<LocalId>>) -> Self {
        Self {
            hoisted,
            frames: vec![Frame {
                label: "$sm0".to_string(),
                parent: None,
                cases: Vec::new(),
            }],
            frame: 0,
            state_frames: vec![0],
            state: 0,
            body: Vec::new(),
            regions: Vec::new(),
            region_stack: Vec::new(),
            suspend_points: Vec::new(),
            live_at_suspend,
            finally_functions: Vec::new(),
            uses_do_finally: false,
        }
    }

    pub(super) fn state_count(&self) -> usize {
        self.state_frames.len()
    }

    fn alloc_state(&mut self, frame: usize) -> StateId {
        let id = self.state_frames.len() as StateId;
        self.state_frames.push(frame);
        id
    }

    fn frame_of(&self, state: StateId) -> usize {
        usize::try_from(state)
            .ok()
            .and_then(|i| self.state_frames.get(i).copied())
            .unwrap_or(0)
    }

    /// True if `frame` is `ancestor` or nested inside it
    fn is_within(&self, mut frame: usize, ancestor: usize) -> bool {
        loop {
            if frame == ancestor {
                return true;
            }
            match self.frames[frame].parent {
                Some(parent) => frame = parent,
                None => return false,
            }
        }
    }

    /// Label of the innermost loop enclosing both the current code and `target`
    fn jump_label(&self, target: StateId) -> String {
        let target_frame = self.frame_of(target);
        let mut frame = self.frame;
        while !self.is_within(target_frame, frame) {
            match self.frames[frame].parent {
                Some(parent) => frame = parent,
                None => break,
            }
        }
        self.frames[frame].label.clone()
    }

    /// `$state = target; continue <loop>;`
    pub(crate) fn goto(&self, target: StateId) -> Vec<LStmt> {
        vec![
            LStmt::assign(STATE_FIELD, LExpr::int(target)),
            LStmt::continue_to(Some(self.jump_label(target))),
        ]
    }

    fn finish_state(&mut self) {
        let mut body = Vec::with_capacity(self.body.len() + 1);
        body.push(LStmt::assign(STATE_FIELD, LExpr::int(FINISHED)));
        body.append(&mut self.body);
        let frame = self.frame_of(self.state);
        self.frames[frame].cases.push(SwitchCase {
            values: vec![self.state],
            body,
        });
    }

    fn begin(&mut self, state: StateId) {
        debug_assert!(self.body.is_empty());
        self.state = state;
    }

    /// End the current state with an unconditional jump
    fn jump_to(&mut self, target: StateId) {
        let jump = self.goto(target);
        self.body.extend(jump);
        self.finish_state();
    }

    fn ends_in_jump(&self) -> bool {
        self.body.last().is_some_and(LStmt::is_jump)
    }

    fn fall_through_to(&mut self, target: StateId) {
        if !self.ends_in_jump() {
            let jump = self.goto(target);
            self.body.extend(jump);
        }
        self.finish_state();
    }

    /// A state nothing has been emitted into yet, usable as a jump target
    fn ensure_fresh_state(&mut self) -> StateId {
        if self.body.is_empty() {
            return self.state;
        }
        let fresh = self.alloc_state(self.frame);
        self.fall_through_to(fresh);
        self.begin(fresh);
        fresh
    }

    fn new_frame(&mut self) -> usize {
        let index = self.frames.len();
        self.frames.push(Frame {
            label: format!("$sm{}", index),
            parent: Some(self.frame),
            cases: Vec::new(),
        });
        index
    }

    fn states_within(&self, frame: usize) -> Vec<StateId> {
        (0..self.state_frames.len())
            .filter(|&i| self.is_within(self.state_frames[i], frame))
            .map(|i| i as StateId)
            .collect()
    }

    /// `$smN: for (;;) { switch ($state) { ... default: break $smN; } }`
    pub(super) fn frame_loop(&mut self, frame: usize) -> LStmt {
        let mut cases = std::mem::take(&mut self.frames[frame].cases);
        cases.sort_by_key(|c| c.values.first().copied().unwrap_or(FINISHED));
        let label = self.frames[frame].label.clone();
        let switch = LStmt::new(LStmtKind::Switch {
            subject: LExpr::ident(STATE_FIELD),
            cases,
            default: Some(vec![LStmt::break_to(Some(label.clone()))]),
        });
        LStmt::new(LStmtKind::For {
            label: Some(label),
            cond: None,
            update: Vec::new(),
            body: vec![switch],
        })
    }

    fn suspends_inside_finally_region(&self) -> bool {
        self.region_stack
            .iter()
            .any(|id| self.regions[id.0 as usize].finally_function.is_some())
    }
}

impl<'a> Lowerer<'a> {
    /// Jump to a state from the code being emitted
    pub(in crate::compiler::lower) fn goto_state(
        &mut self,
        state: StateId,
    ) -> CompileResult<Vec<LStmt>> {
        Ok(self.machine_mut()?.goto(state))
    }

    /// Cut `stmts` into states and return the outermost dispatch loop
    pub(super) fn build_state_machine(&mut self, stmts: &[Stmt]) -> CompileResult<LStmt> {
        for stmt in stmts {
            self.process_stmt(stmt)?;
        }
        let machine = self.machine_mut()?;
        if !machine.ends_in_jump() {
            machine.body.push(LStmt::ret(Some(LExpr::boolean(false))));
        }
        machine.finish_state();
        Ok(machine.frame_loop(0))
    }

    fn emit_plain(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let mut out = Vec::new();
        self.lower_stmt(stmt, &mut out)?;
        self.machine_mut()?.body.extend(out);
        Ok(())
    }

    fn process_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        if !stmt.contains_suspend() {
            return self.emit_plain(stmt);
        }
        match &stmt.kind {
            StmtKind::YieldReturn(value) => self.process_yield(value, stmt.span),
            StmtKind::Block(stmts) => stmts.iter().try_for_each(|s| self.process_stmt(s)),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.process_if(cond, then_branch, else_branch.as_deref(), stmt.span),
            StmtKind::While { cond, body } => self.process_while(cond, body, stmt.span),
            StmtKind::DoWhile { body, cond } => self.process_do_while(body, cond),
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => self.process_for(init, cond.as_ref(), update, body, stmt.span),
            StmtKind::Try(t) => self.process_region(t, stmt.span),
            _ => Err(CompileError::internal(format!(
                "cannot split statement at {}:{} into iterator states",
                stmt.span.line, stmt.span.column
            ))),
        }
    }

    fn process_yield(&mut self, value: &Expr, span: Span) -> CompileResult<()> {
        let set_current = self.set_current(value, span);
        let machine = self.machine_mut()?;
        let resume = machine.alloc_state(machine.frame);

        machine.body.push(set_current);
        machine
            .body
            .push(LStmt::assign(STATE_FIELD, LExpr::int(resume)));
        if machine.suspends_inside_finally_region() {
            machine.uses_do_finally = true;
            machine
                .body
                .push(LStmt::assign(DO_FINALLY, LExpr::boolean(false)));
        }
        machine.body.push(LStmt::ret(Some(LExpr::boolean(true))));

        let index = machine.suspend_points.len();
        let live = machine
            .live_at_suspend
            .get(index)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| machine.hoisted.contains(id))
                    .collect()
            })
            .unwrap_or_default();
        machine.suspend_points.push(SuspendPoint {
            resume_state: resume,
            live,
            active_regions: machine.region_stack.clone(),
            span,
        });

        machine.finish_state();
        machine.begin(resume);
        Ok(())
    }

    fn process_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        span: Span,
    ) -> CompileResult<()> {
        let cond = self.lower_expr(cond);
        let machine = self.machine_mut()?;
        let after = machine.alloc_state(machine.frame);
        let else_state = else_branch.map(|_| machine.alloc_state(machine.frame));
        let skip = machine.goto(else_state.unwrap_or(after));
        machine
            .body
            .push(LStmt::if_(LExpr::not(cond), skip, None).with_origin(Origin::from_span(span)));

        self.process_stmt(then_branch)?;
        self.machine_mut()?.fall_through_to(after);

        if let (Some(else_branch), Some(else_state)) = (else_branch, else_state) {
            self.machine_mut()?.begin(else_state);
            self.process_stmt(else_branch)?;
            self.machine_mut()?.fall_through_to(after);
        }
        self.machine_mut()?.begin(after);
        Ok(())
    }

    fn process_loop_body(
        &mut self,
        body: &Stmt,
        break_state: StateId,
        continue_state: StateId,
    ) -> CompileResult<()> {
        self.loop_stack
            .push(LoopContext::states(break_state, continue_state));
        let result = self.process_stmt(body);
        self.loop_stack.pop();
        result
    }

    fn process_while(&mut self, cond: &Expr, body: &Stmt, span: Span) -> CompileResult<()> {
        let machine = self.machine_mut()?;
        let head = machine.ensure_fresh_state();
        let after = machine.alloc_state(machine.frame);
        let exit = machine.goto(after);

        let cond = self.lower_expr(cond);
        self.machine_mut()?
            .body
            .push(LStmt::if_(LExpr::not(cond), exit, None).with_origin(Origin::from_span(span)));

        self.process_loop_body(body, after, head)?;
        let machine = self.machine_mut()?;
        machine.fall_through_to(head);
        machine.begin(after);
        Ok(())
    }

    fn process_do_while(&mut self, body: &Stmt, cond: &Expr) -> CompileResult<()> {
        let machine = self.machine_mut()?;
        let head = machine.ensure_fresh_state();
        let cond_state = machine.alloc_state(machine.frame);
        let after = machine.alloc_state(machine.frame);

        self.process_loop_body(body, after, cond_state)?;
        let machine = self.machine_mut()?;
        machine.fall_through_to(cond_state);
        machine.begin(cond_state);

        let cond = self.lower_expr(cond);
        let machine = self.machine_mut()?;
        let repeat = machine.goto(head);
        machine.body.push(LStmt::if_(cond, repeat, None));
        machine.jump_to(after);
        machine.begin(after);
        Ok(())
    }

    fn process_for(
        &mut self,
        init: &[Stmt],
        cond: Option<&Expr>,
        update: &[Expr],
        body: &Stmt,
        span: Span,
    ) -> CompileResult<()> {
        for stmt in init {
            self.process_stmt(stmt)?;
        }
        let machine = self.machine_mut()?;
        let head = machine.ensure_fresh_state();
        let update_state = machine.alloc_state(machine.frame);
        let after = machine.alloc_state(machine.frame);

        if let Some(cond) = cond {
            let cond = self.lower_expr(cond);
            let machine = self.machine_mut()?;
            let exit = machine.goto(after);
            machine
                .body
                .push(LStmt::if_(LExpr::not(cond), exit, None).with_origin(Origin::from_span(span)));
        }

        self.process_loop_body(body, after, update_state)?;
        let machine = self.machine_mut()?;
        machine.fall_through_to(update_state);
        machine.begin(update_state);

        let update: Vec<LStmt> = self.lower_exprs(update).into_iter().map(LStmt::expr).collect();
        let machine = self.machine_mut()?;
        machine.body.extend(update);
        machine.jump_to(head);
        machine.begin(after);
        Ok(())
    }

    /// A `try` whose body suspends
    fn process_region(&mut self, t: &TryStmt, span: Span) -> CompileResult<()> {
        if t.catches.is_empty() && t.finally.is_none() {
            return t.body.iter().try_for_each(|s| self.process_stmt(s));
        }

        let machine = self.machine_mut()?;
        let parent_frame = machine.frame;
        let after = machine.alloc_state(parent_frame);
        let id = RegionId(machine.regions.len() as u32);
        let finally_name = t
            .finally
            .as_ref()
            .map(|_| format!("$finally{}", id.0 + 1));
        machine.regions.push(TryRegion {
            id,
            parent: machine.region_stack.last().copied(),
            finally_function: finally_name.clone(),
            states: Vec::new(),
            span,
        });

        let frame = machine.new_frame();
        let entry = machine.alloc_state(frame);
        machine.jump_to(entry);
        machine.frame = frame;
        machine.region_stack.push(id);
        machine.begin(entry);

        for stmt in &t.body {
            self.process_stmt(stmt)?;
        }

        let machine = self.machine_mut()?;
        machine.fall_through_to(after);
        machine.region_stack.pop();
        machine.frame = parent_frame;
        let states = machine.states_within(frame);
        machine.regions[id.0 as usize].states = states.clone();
        let inner = machine.frame_loop(frame);

        let handler = self.lower_catch_clauses(&t.catches)?;
        let finalizer = match (&t.finally, finally_name) {
            (Some(finally), Some(name)) => {
                let body = self.lower_finally_body(finally)?;
                let machine = self.machine_mut()?;
                machine.finally_functions.push((name.clone(), body));
                machine.uses_do_finally = true;
                Some(vec![LStmt::if_(
                    LExpr::ident(DO_FINALLY),
                    vec![LStmt::expr(LExpr::call(LExpr::ident(name), Vec::new()))],
                    None,
                )])
            }
            _ => None,
        };

        let machine = self.machine_mut()?;
        let mut body = vec![LStmt::new(LStmtKind::Try {
            body: vec![inner],
            handler,
            finalizer,
        })
        .with_origin(Origin::from_span(span))];
        body.extend(machine.goto(after));
        machine.frames[parent_frame]
            .cases
            .push(SwitchCase { values: states, body });
        machine.begin(after);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StateMachine {
        StateMachine::new(FxHashSet::default(), Vec::new())
    }

    #[test]
    fn test_goto_continues_owning_loop() {
        let mut m = machine();
        let inner = m.new_frame();
        let inside = m.alloc_state(inner);
        let outside = m.alloc_state(0);

        // From the root frame only the root loop is in scope
        let jump = m.goto(inside);
        assert_eq!(jump[1].kind, LStmtKind::Continue(Some("$sm0".to_string())));

        m.frame = inner;
        let jump = m.goto(inside);
        assert_eq!(jump[1].kind, LStmtKind::Continue(Some("$sm1".to_string())));
        let jump = m.goto(outside);
        assert_eq!(jump[1].kind, LStmtKind::Continue(Some("$sm0".to_string())));
    }

    #[test]
    fn test_fresh_state_reuses_empty_state() {
        let mut m = machine();
        assert_eq!(m.ensure_fresh_state(), 0);
        m.body.push(LStmt::expr(LExpr::int(1)));
        let fresh = m.ensure_fresh_state();
        assert_eq!(fresh, 1);
        assert_eq!(m.frames[0].cases.len(), 1);
        // State 0 falls through to the new state
        let case = &m.frames[0].cases[0];
        assert_eq!(case.body[0], LStmt::assign(STATE_FIELD, LExpr::int(FINISHED)));
        assert!(case.body.last().is_some_and(LStmt::is_jump));
    }

    #[test]
    fn test_states_within_includes_nested_frames() {
        let mut m = machine();
        let outer = m.new_frame();
        m.frame = outer;
        let a = m.alloc_state(outer);
        let inner = m.new_frame();
        let b = m.alloc_state(inner);
        let _root = m.alloc_state(0);
        assert_eq!(m.states_within(outer), vec![a, b]);
        assert_eq!(m.states_within(inner), vec![b]);
    }

    #[test]
    fn test_frame_loop_sorts_cases() {
        let mut m = machine();
        m.frames[0].cases.push(SwitchCase {
            values: vec![2],
            body: vec![],
        });
        m.frames[0].cases.push(SwitchCase {
            values: vec![0],
            body: vec![],
        });
        let LStmtKind::For { label, body, .. } = m.frame_loop(0).kind else {
            panic!("expected loop");
        };
        assert_eq!(label.as_deref(), Some("$sm0"));
        let LStmtKind::Switch { cases, default, .. } = &body[0].kind else {
            panic!("expected switch");
        };
        assert_eq!(cases[0].values, vec![0]);
        assert_eq!(cases[1].values, vec![2]);
        assert!(default.is_some());
    }
}
