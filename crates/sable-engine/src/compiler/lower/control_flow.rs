//! Control Flow Lowering Utilities
//!
//! Tracks where `break` and `continue` go while a function body is lowered.
//! A loop lowered to a native target loop takes native jumps; a loop that
//! was split into iterator states jumps by assigning the state field.

/// Resume-point number of an iterator state
pub type StateId = i64;

/// What a `break`/`continue` inside this context lowers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    /// Native loop: plain `break;` / `continue;`
    Native,
    /// Loop decomposed into iterator states
    State {
        break_state: StateId,
        continue_state: StateId,
    },
    /// Body of a finally clause; jumps may not cross it
    Barrier,
}

/// Context for managing loop control flow
#[derive(Debug, Clone, Copy)]
pub struct LoopContext {
    pub target: JumpTarget,
}

impl LoopContext {
    pub fn native() -> Self {
        Self {
            target: JumpTarget::Native,
        }
    }

    pub fn states(break_state: StateId, continue_state: StateId) -> Self {
        Self {
            target: JumpTarget::State {
                break_state,
                continue_state,
            },
        }
    }

    pub fn barrier() -> Self {
        Self {
            target: JumpTarget::Barrier,
        }
    }
}

/// Resolved destination of a jump statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    Native,
    State(StateId),
    /// Would leave a finally body
    CrossesBarrier,
    /// Not inside any loop
    NoLoop,
}

/// Stack of active loop contexts for nested loops
#[derive(Debug, Default)]
pub struct LoopStack {
    stack: Vec<LoopContext>,
}

impl LoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ctx: LoopContext) {
        self.stack.push(ctx);
    }

    pub fn pop(&mut self) -> Option<LoopContext> {
        self.stack.pop()
    }

    /// Get the current (innermost) loop context
    pub fn current(&self) -> Option<&LoopContext> {
        self.stack.last()
    }

    pub fn break_target(&self) -> Jump {
        match self.current().map(|ctx| ctx.target) {
            None => Jump::NoLoop,
            Some(JumpTarget::Native) => Jump::Native,
            Some(JumpTarget::State { break_state, .. }) => Jump::State(break_state),
            Some(JumpTarget::Barrier) => Jump::CrossesBarrier,
        }
    }

    pub fn continue_target(&self) -> Jump {
        match self.current().map(|ctx| ctx.target) {
            None => Jump::NoLoop,
            Some(JumpTarget::Native) => Jump::Native,
            Some(JumpTarget::State { continue_state, .. }) => Jump::State(continue_state),
            Some(JumpTarget::Barrier) => Jump::CrossesBarrier,
        }
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
