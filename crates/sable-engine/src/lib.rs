//! Sable lowering engine
//!
//! Turns resolved syntax trees of a statically typed, exception-rich source
//! language into script text for a dynamically typed target, together with a
//! source map back to the original files.
//!
//! - [`syntax`] - the resolved input tree
//! - [`compiler`] - lowering, emission and source maps
//! - [`runtime`] - a reference evaluator for lowered output

pub mod compiler;
pub mod runtime;
pub mod syntax;

pub use compiler::{
    CompileError, CompileOptions, CompileResult, CompiledUnit, Compiler, IteratorStateDescriptor,
    LoweredUnit, MapDocument,
};
pub use runtime::{Interpreter, RuntimeError, Value};
pub use syntax::{CompilationUnit, SourceSet};
