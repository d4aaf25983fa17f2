//! Reference evaluator for lowered units
//!
//! Runs a [`LoweredUnit`](crate::compiler::ir::LoweredUnit) directly, without
//! going through emitted text. The test suites use it to check that lowered
//! exception dispatch and iterator state machines behave like the source
//! constructs they replace.

mod error;
mod interp;
pub mod value;

pub use error::{RuntimeError, RuntimeResult};
pub use interp::{HostFn, Interpreter, TRACE_HOST};
pub use value::{ObjectRef, Value};
