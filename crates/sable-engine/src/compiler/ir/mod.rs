//! Lowered representation
//!
//! The lowering engines turn resolved syntax into this reduced tree, which
//! the emitter walks linearly to produce target text.
//!
//! # Structure
//!
//! - `LoweredUnit` - all functions of one compiled output unit
//! - `LFunction` - a top-level function
//! - `LStmt` / `LExpr` - statements and expressions the target expresses directly
//! - `Origin` - original-source position attached to a lowered node

pub mod expr;
pub mod function;
pub mod origin;
pub mod pretty;
pub mod stmt;

pub use expr::{LExpr, LExprKind, RuntimeHelper, TypeRef};
pub use function::{LFunction, LoweredUnit};
pub use origin::Origin;
pub use pretty::PrettyPrint;
pub use stmt::{
    ArmTest, CatchArm, CatchDispatch, CatchHandler, LStmt, LStmtKind, SwitchCase,
};
