//! Resolved syntax tree handed over by the semantic analyzer
//!
//! Lexing, parsing and binding happen upstream. What arrives here is a tree
//! with every local bound to a [`LocalId`], every type reference resolved to a
//! [`TypeId`], and every node tagged with the [`Span`] it came from.

pub mod build;
pub mod node;
pub mod span;
pub mod types;

pub use node::*;
pub use span::{SourceFile, SourceId, SourceSet, Span};
pub use types::{TypeId, TypeInfo, TypeTable};
