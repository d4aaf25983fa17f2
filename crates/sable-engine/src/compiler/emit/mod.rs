//! Target text emission
//!
//! Walks a lowered unit once, writing script text and reporting the generated
//! position of every statement (and of every expression that has an origin)
//! to a [`PositionSink`]. The sink is usually a
//! [`PositionTracker`](crate::compiler::sourcemap::PositionTracker).

mod writer;

pub use writer::SourceWriter;

use crate::compiler::ir::{
    ArmTest, CatchDispatch, LExpr, LExprKind, LFunction, LStmt, LStmtKind, LoweredUnit, Origin,
    SwitchCase,
};
use crate::compiler::sourcemap::PositionSink;
use crate::syntax::Literal;

/// Renders lowered trees as script text
pub struct Renderer<'s, S: PositionSink> {
    writer: SourceWriter,
    sink: &'s mut S,
    runtime: String,
}

impl<'s, S: PositionSink> Renderer<'s, S> {
    pub fn new(sink: &'s mut S, runtime: impl Into<String>, indent_width: usize) -> Self {
        Self {
            writer: SourceWriter::new(indent_width),
            sink,
            runtime: runtime.into(),
        }
    }

    pub fn finish(self) -> String {
        self.writer.take_output()
    }

    pub fn render_unit(&mut self, unit: &LoweredUnit) {
        for (i, function) in unit.functions.iter().enumerate() {
            if i > 0 {
                self.writer.newline();
            }
            self.render_function(function);
        }
    }

    pub fn render_function(&mut self, function: &LFunction) {
        let origin = function.origin.clone().map(|o| Origin {
            name: Some(function.name.clone()),
            ..o
        });
        self.mark(origin.as_ref(), true);
        self.writer.write(&format!(
            "function {}({}) {{",
            function.name,
            function.params.join(", ")
        ));
        self.writer.newline();
        self.render_body(&function.body);
        self.writer.write_line("}");
    }

    fn mark(&mut self, origin: Option<&Origin>, statement: bool) {
        if origin.is_some() || statement {
            let pos = self.writer.position();
            self.sink.record(pos, origin);
        }
    }

    fn render_body(&mut self, stmts: &[LStmt]) {
        self.writer.indent();
        for stmt in stmts {
            self.render_stmt(stmt);
        }
        self.writer.dedent();
    }

    fn label_prefix(label: &Option<String>) -> String {
        match label {
            Some(l) => format!("{}: ", l),
            None => String::new(),
        }
    }

    pub fn render_stmt(&mut self, stmt: &LStmt) {
        self.mark(stmt.origin.as_ref(), true);
        match &stmt.kind {
            LStmtKind::Expr(e) => {
                self.render_expr(e);
                self.writer.write(";");
                self.writer.newline();
            }
            LStmtKind::Var { name, init } => {
                self.writer.write(&format!("var {}", name));
                if let Some(init) = init {
                    self.writer.write(" = ");
                    self.render_expr(init);
                }
                self.writer.write(";");
                self.writer.newline();
            }
            LStmtKind::Block(stmts) => {
                self.writer.write_line("{");
                self.render_body(stmts);
                self.writer.write_line("}");
            }
            LStmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.writer.write("if (");
                self.render_expr(cond);
                self.writer.write_line(") {");
                self.render_body(then_branch);
                if let Some(else_branch) = else_branch {
                    self.writer.write_line("} else {");
                    self.render_body(else_branch);
                }
                self.writer.write_line("}");
            }
            LStmtKind::While { label, cond, body } => {
                self.writer.write(&Self::label_prefix(label));
                self.writer.write("while (");
                self.render_expr(cond);
                self.writer.write_line(") {");
                self.render_body(body);
                self.writer.write_line("}");
            }
            LStmtKind::DoWhile { label, body, cond } => {
                self.writer.write(&Self::label_prefix(label));
                self.writer.write_line("do {");
                self.render_body(body);
                self.writer.write("} while (");
                self.render_expr(cond);
                self.writer.write_line(");");
            }
            LStmtKind::For {
                label,
                cond,
                update,
                body,
            } => {
                self.writer.write(&Self::label_prefix(label));
                self.writer.write("for (;");
                if let Some(cond) = cond {
                    self.writer.write(" ");
                    self.render_expr(cond);
                }
                self.writer.write(";");
                for (i, u) in update.iter().enumerate() {
                    self.writer.write(if i == 0 { " " } else { ", " });
                    self.render_expr(u);
                }
                self.writer.write_line(") {");
                self.render_body(body);
                self.writer.write_line("}");
            }
            LStmtKind::Switch {
                subject,
                cases,
                default,
            } => {
                self.writer.write("switch (");
                self.render_expr(subject);
                self.writer.write_line(") {");
                self.writer.indent();
                for case in cases {
                    self.render_case(case);
                }
                if let Some(default) = default {
                    self.writer.write_line("default: {");
                    self.render_body(default);
                    self.writer.write_line("}");
                }
                self.writer.dedent();
                self.writer.write_line("}");
            }
            LStmtKind::Break(label) => match label {
                Some(l) => self.writer.write_line(&format!("break {};", l)),
                None => self.writer.write_line("break;"),
            },
            LStmtKind::Continue(label) => match label {
                Some(l) => self.writer.write_line(&format!("continue {};", l)),
                None => self.writer.write_line("continue;"),
            },
            LStmtKind::Return(value) => {
                self.writer.write("return");
                if let Some(value) = value {
                    self.writer.write(" ");
                    self.render_expr(value);
                }
                self.writer.write_line(";");
            }
            LStmtKind::Throw(value) => {
                self.writer.write("throw ");
                self.render_expr(value);
                self.writer.write_line(";");
            }
            LStmtKind::Try {
                body,
                handler,
                finalizer,
            } => {
                self.writer.write_line("try {");
                self.render_body(body);
                if let Some(handler) = handler {
                    self.writer
                        .write_line(&format!("}} catch ({}) {{", handler.binding));
                    self.render_body(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.writer.write_line("} finally {");
                    self.render_body(finalizer);
                }
                self.writer.write_line("}");
            }
            LStmtKind::CatchDispatch(dispatch) => self.render_dispatch(dispatch),
            LStmtKind::Comment(text) => self.writer.write_line(&format!("// {}", text)),
        }
    }

    fn render_case(&mut self, case: &SwitchCase) {
        let last = case.values.len().saturating_sub(1);
        for (i, value) in case.values.iter().enumerate() {
            if i == last {
                self.writer.write_line(&format!("case {}: {{", value));
            } else {
                self.writer.write_line(&format!("case {}:", value));
            }
        }
        self.render_body(&case.body);
        self.writer.write_line("}");
    }

    /// `if (test1) {...} else if (test2) {...} else { throw subject; }`
    fn render_dispatch(&mut self, dispatch: &CatchDispatch) {
        let count = dispatch.arms.len();
        for (i, arm) in dispatch.arms.iter().enumerate() {
            let is_last = i + 1 == count;
            if i > 0 {
                self.writer.write("} else ");
            }
            self.mark(arm.origin.as_ref(), false);
            match &arm.test {
                ArmTest::Always if i > 0 && is_last && !dispatch.rethrow => {
                    self.writer.write_line("{");
                }
                ArmTest::Always => self.writer.write_line("if (true) {"),
                ArmTest::InstanceOf(ty) => self.writer.write_line(&format!(
                    "if ({}.isInstanceOf({}, {})) {{",
                    self.runtime, dispatch.subject, ty.name
                )),
            }
            if !arm.reachable {
                self.writer.indent();
                self.writer.write_line("// unreachable handler");
                self.writer.dedent();
            }
            self.render_body(&arm.body);
        }
        if dispatch.rethrow {
            if count > 0 {
                self.writer.write_line("} else {");
            } else {
                self.writer.write_line("{");
            }
            self.writer.indent();
            self.writer
                .write_line(&format!("throw {};", dispatch.subject));
            self.writer.dedent();
        }
        if count > 0 || dispatch.rethrow {
            self.writer.write_line("}");
        }
    }

    fn needs_parens(expr: &LExpr) -> bool {
        matches!(
            expr.kind,
            LExprKind::Binary { .. } | LExprKind::Assign { .. } | LExprKind::Function { .. }
        )
    }

    fn render_operand(&mut self, expr: &LExpr) {
        let wrap = Self::needs_parens(expr);
        self.render_wrapped(expr, wrap);
    }

    /// `-(-x)` must not render as the decrement `--x`
    fn render_unary_operand(&mut self, expr: &LExpr) {
        let wrap = Self::needs_parens(expr)
            || matches!(expr.kind, LExprKind::Unary { .. })
            || is_negative_number(expr);
        self.render_wrapped(expr, wrap);
    }

    /// `5.toString()` does not parse; `(5).toString()` does
    fn render_receiver(&mut self, expr: &LExpr) {
        let wrap = Self::needs_parens(expr)
            || matches!(
                expr.kind,
                LExprKind::Literal(Literal::Int(_) | Literal::Float(_)) | LExprKind::Unary { .. }
            );
        self.render_wrapped(expr, wrap);
    }

    fn render_wrapped(&mut self, expr: &LExpr, wrap: bool) {
        if wrap {
            self.writer.write("(");
            self.render_expr(expr);
            self.writer.write(")");
        } else {
            self.render_expr(expr);
        }
    }

    fn render_args(&mut self, args: &[LExpr]) {
        self.writer.write("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.writer.write(", ");
            }
            self.render_expr(arg);
        }
        self.writer.write(")");
    }

    pub fn render_expr(&mut self, expr: &LExpr) {
        self.mark(expr.origin.as_ref(), false);
        match &expr.kind {
            LExprKind::Literal(lit) => {
                let text = render_literal(lit);
                self.writer.write(&text);
            }
            LExprKind::Ident(name) => self.writer.write(name),
            LExprKind::Assign { target, value } => {
                self.writer.write(&format!("{} = ", target));
                self.render_expr(value);
            }
            LExprKind::Binary { op, left, right } => {
                self.render_operand(left);
                self.writer.write(&format!(" {} ", op.as_str()));
                self.render_operand(right);
            }
            LExprKind::Unary { op, operand } => {
                self.writer.write(op.as_str());
                self.render_unary_operand(operand);
            }
            LExprKind::Call { callee, args } => {
                self.render_operand(callee);
                self.render_args(args);
            }
            LExprKind::Member { object, name } => {
                self.render_receiver(object);
                self.writer.write(&format!(".{}", name));
            }
            LExprKind::New { ty, args } => {
                self.writer.write(&format!("new {}", ty.name));
                self.render_args(args);
            }
            LExprKind::Function { params, body } => {
                self.writer
                    .write(&format!("function({}) {{", params.join(", ")));
                self.writer.newline();
                self.render_body(body);
                self.writer.write("}");
            }
            LExprKind::Runtime { helper, args } => {
                self.writer
                    .write(&format!("{}.{}", self.runtime, helper.name()));
                self.render_args(args);
            }
        }
    }
}

fn is_negative_number(expr: &LExpr) -> bool {
    match expr.kind {
        LExprKind::Literal(Literal::Int(i)) => i < 0,
        LExprKind::Literal(Literal::Float(f)) => f.is_sign_negative() && !f.is_nan(),
        _ => false,
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) if f.is_nan() => "NaN".to_string(),
        Literal::Float(f) if f.is_infinite() => {
            if *f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
        }
        Literal::Float(f) => f.to_string(),
        // JSON string escaping is valid script string syntax
        Literal::Str(s) => serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()),
    }
}
