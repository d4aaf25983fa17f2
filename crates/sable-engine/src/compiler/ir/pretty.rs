//! Pretty-printing for lowered trees
//!
//! Provides human-readable output for debugging lowered structures. The text
//! is what the emitter would write, prefixed with a header naming the unit and
//! its types.

use super::function::{LFunction, LoweredUnit};
use super::stmt::LStmt;
use crate::compiler::emit::Renderer;
use std::fmt::Write;

const RUNTIME: &str = "$rt";
const INDENT: usize = 2;

/// Trait for pretty-printing lowered constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for LoweredUnit {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "// unit {}", self.name);
        for (i, ty) in self.types.iter() {
            match ty.base {
                Some(base) => {
                    let _ = writeln!(output, "// type {} = {} : {}", i, ty.name, self.types.name(base));
                }
                None => {
                    let _ = writeln!(output, "// type {} = {}", i, ty.name);
                }
            }
        }
        let _ = writeln!(output);

        let mut sink = ();
        let mut renderer = Renderer::new(&mut sink, RUNTIME, INDENT);
        renderer.render_unit(self);
        output.push_str(&renderer.finish());
        output
    }
}

impl PrettyPrint for LFunction {
    fn pretty_print(&self) -> String {
        let mut sink = ();
        let mut renderer = Renderer::new(&mut sink, RUNTIME, INDENT);
        renderer.render_function(self);
        renderer.finish()
    }
}

impl PrettyPrint for LStmt {
    fn pretty_print(&self) -> String {
        let mut sink = ();
        let mut renderer = Renderer::new(&mut sink, RUNTIME, INDENT);
        renderer.render_stmt(self);
        renderer.finish()
    }
}
