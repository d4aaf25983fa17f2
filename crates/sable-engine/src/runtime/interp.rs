//! Tree-walking evaluator for lowered units
//!
//! Executes the lowered tree directly with the target's semantics: `var` is
//! function scoped and hoisted, `switch` cases fall through, labelled
//! `break`/`continue` leave or restart the named loop, and an abrupt
//! completion of a `finally` body replaces the completion of its `try`.

use super::error::{RuntimeError, RuntimeResult};
use super::value::{Closure, Env, Object, ObjectRef, Scope, Value};
use crate::compiler::ir::{
    ArmTest, CatchDispatch, CatchHandler, LExpr, LExprKind, LStmt, LStmtKind, LoweredUnit,
    RuntimeHelper, SwitchCase,
};
use crate::syntax::{BinaryOp, Literal, TypeId, TypeTable, UnaryOp};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// A function supplied by the embedding
pub type HostFn = Rc<dyn Fn(&[Value]) -> RuntimeResult<Value>>;

/// Host function every interpreter provides: records its argument
pub const TRACE_HOST: &str = "trace";

const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// How a statement finished
#[derive(Debug)]
enum Completion {
    /// Fall through to the next statement
    Normal,
    Break(Option<String>),
    Continue(Option<String>),
    Return(Value),
}

/// What a loop does with its body's completion
enum LoopControl {
    Next,
    Exit,
    Propagate(Completion),
}

pub struct Interpreter {
    types: TypeTable,
    functions: FxHashMap<String, Value>,
    hosts: FxHashMap<String, HostFn>,
    trace: Vec<Value>,
    next_identity: u64,
    steps: u64,
    step_limit: u64,
}

impl Interpreter {
    pub fn new(unit: &LoweredUnit) -> Self {
        let functions = unit
            .functions
            .iter()
            .map(|f| {
                let closure = Closure {
                    name: f.name.clone(),
                    params: f.params.clone(),
                    body: Arc::from(f.body.clone()),
                    env: None,
                };
                (f.name.clone(), Value::Function(Rc::new(closure)))
            })
            .collect();
        Self {
            types: unit.types.clone(),
            functions,
            hosts: FxHashMap::default(),
            trace: Vec::new(),
            next_identity: 0,
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Fault instead of running more than `limit` loop iterations and calls
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn register_host<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + 'static,
    {
        self.hosts.insert(name.into(), Rc::new(f));
    }

    /// Values passed to `trace`, in call order
    pub fn trace(&self) -> &[Value] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.trace)
    }

    pub fn function(&self, name: &str) -> Option<Value> {
        self.functions.get(name).cloned()
    }

    /// Allocate an object with the next identity
    pub fn new_object(&mut self, class: Option<TypeId>) -> ObjectRef {
        self.next_identity += 1;
        Rc::new(RefCell::new(Object {
            id: self.next_identity,
            class,
            fields: FxHashMap::default(),
        }))
    }

    /// Call a top-level function of the unit
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        let function = self
            .function(name)
            .ok_or_else(|| RuntimeError::fault(format!("no function named '{}'", name)))?;
        self.call_value(&function, args)
    }

    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> RuntimeResult<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(closure.clone(), args),
            Value::Host(name) => self.call_host(name, &args),
            other => Err(RuntimeError::fault(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }

    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        match receiver.field(name) {
            Value::Undefined => Err(RuntimeError::fault(format!(
                "{} has no method '{}'",
                receiver.type_name(),
                name
            ))),
            method => self.call_value(&method, args),
        }
    }

    /// Drive the enumerator protocol the way a `foreach` loop does: at most
    /// `limit` items, then `dispose` no matter how the loop ended.
    pub fn enumerate(&mut self, sequence: &Value, limit: Option<usize>) -> RuntimeResult<Vec<Value>> {
        let enumerator = match sequence.field("getEnumerator") {
            Value::Undefined => sequence.clone(),
            _ => self.call_method(sequence, "getEnumerator", Vec::new())?,
        };
        let mut items = Vec::new();
        let drained = self.drain(&enumerator, limit, &mut items);
        let disposed = self.call_method(&enumerator, "dispose", Vec::new());
        match (drained, disposed) {
            (_, Err(e)) | (Err(e), Ok(_)) => Err(e),
            (Ok(()), Ok(_)) => Ok(items),
        }
    }

    fn drain(
        &mut self,
        enumerator: &Value,
        limit: Option<usize>,
        items: &mut Vec<Value>,
    ) -> RuntimeResult<()> {
        loop {
            if limit.is_some_and(|l| items.len() >= l) {
                break;
            }
            if !self.call_method(enumerator, "moveNext", Vec::new())?.is_truthy() {
                break;
            }
            items.push(self.call_method(enumerator, "getCurrent", Vec::new())?);
        }
        Ok(())
    }

    fn tick(&mut self) -> RuntimeResult<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(RuntimeError::fault(format!(
                "step limit of {} exceeded",
                self.step_limit
            )));
        }
        Ok(())
    }

    fn call_host(&mut self, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        if let Some(host) = self.hosts.get(name).cloned() {
            return host(args);
        }
        if name == TRACE_HOST {
            self.trace.push(args.first().cloned().unwrap_or_default());
            return Ok(Value::Undefined);
        }
        Err(RuntimeError::fault(format!("unknown host function '{}'", name)))
    }

    fn call_closure(&mut self, closure: Rc<Closure>, args: Vec<Value>) -> RuntimeResult<Value> {
        self.tick()?;
        let mut vars = FxHashMap::default();
        let mut hoisted = Vec::new();
        collect_vars(&closure.body, &mut hoisted);
        for name in hoisted {
            vars.insert(name, Value::Undefined);
        }
        let mut args = args.into_iter();
        for param in &closure.params {
            vars.insert(param.clone(), args.next().unwrap_or_default());
        }
        let env = Rc::new(RefCell::new(Scope {
            vars,
            parent: closure.env.clone(),
        }));

        let body = closure.body.clone();
        match self.exec_block(&body, &env)? {
            Completion::Normal => Ok(Value::Undefined),
            Completion::Return(value) => Ok(value),
            Completion::Break(label) | Completion::Continue(label) => Err(RuntimeError::fault(
                format!(
                    "jump to {} escaped function '{}'",
                    label.as_deref().unwrap_or("enclosing loop"),
                    closure.name
                ),
            )),
        }
    }

    fn lookup(&self, name: &str, env: &Env) -> RuntimeResult<Value> {
        let mut scope = Some(env.clone());
        while let Some(current) = scope {
            if let Some(value) = current.borrow().vars.get(name) {
                return Ok(value.clone());
            }
            scope = current.borrow().parent.clone();
        }
        if let Some(function) = self.functions.get(name) {
            return Ok(function.clone());
        }
        if name == TRACE_HOST || self.hosts.contains_key(name) {
            return Ok(Value::Host(Rc::from(name)));
        }
        Err(RuntimeError::fault(format!("'{}' is not defined", name)))
    }

    fn assign(&self, name: &str, value: Value, env: &Env) -> RuntimeResult<()> {
        let mut scope = Some(env.clone());
        while let Some(current) = scope {
            if let Some(slot) = current.borrow_mut().vars.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            scope = current.borrow().parent.clone();
        }
        Err(RuntimeError::fault(format!(
            "assignment to undeclared '{}'",
            name
        )))
    }

    fn exec_block(&mut self, stmts: &[LStmt], env: &Env) -> RuntimeResult<Completion> {
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &LStmt, env: &Env) -> RuntimeResult<Completion> {
        match &stmt.kind {
            LStmtKind::Expr(e) => {
                self.eval(e, env)?;
                Ok(Completion::Normal)
            }
            LStmtKind::Var { name, init } => {
                if let Some(init) = init {
                    let value = self.eval(init, env)?;
                    env.borrow_mut().vars.insert(name.clone(), value);
                }
                Ok(Completion::Normal)
            }
            LStmtKind::Block(stmts) => self.exec_block(stmts, env),
            LStmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond, env)?.is_truthy() {
                    self.exec_block(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            LStmtKind::While { label, cond, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(cond, env)?.is_truthy() {
                        break;
                    }
                    let completion = self.exec_block(body, env)?;
                    match loop_control(completion, label) {
                        LoopControl::Next => {}
                        LoopControl::Exit => break,
                        LoopControl::Propagate(c) => return Ok(c),
                    }
                }
                Ok(Completion::Normal)
            }
            LStmtKind::DoWhile { label, body, cond } => {
                loop {
                    self.tick()?;
                    let completion = self.exec_block(body, env)?;
                    match loop_control(completion, label) {
                        LoopControl::Next => {}
                        LoopControl::Exit => break,
                        LoopControl::Propagate(c) => return Ok(c),
                    }
                    if !self.eval(cond, env)?.is_truthy() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            LStmtKind::For {
                label,
                cond,
                update,
                body,
            } => {
                loop {
                    self.tick()?;
                    if let Some(cond) = cond {
                        if !self.eval(cond, env)?.is_truthy() {
                            break;
                        }
                    }
                    let completion = self.exec_block(body, env)?;
                    match loop_control(completion, label) {
                        LoopControl::Next => {}
                        LoopControl::Exit => break,
                        LoopControl::Propagate(c) => return Ok(c),
                    }
                    for u in update {
                        self.eval(u, env)?;
                    }
                }
                Ok(Completion::Normal)
            }
            LStmtKind::Switch {
                subject,
                cases,
                default,
            } => self.exec_switch(subject, cases, default.as_deref(), env),
            LStmtKind::Break(label) => Ok(Completion::Break(label.clone())),
            LStmtKind::Continue(label) => Ok(Completion::Continue(label.clone())),
            LStmtKind::Return(value) => {
                let value = match value {
                    Some(v) => self.eval(v, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            LStmtKind::Throw(value) => {
                let value = self.eval(value, env)?;
                Err(RuntimeError::Thrown(value))
            }
            LStmtKind::Try {
                body,
                handler,
                finalizer,
            } => self.exec_try(body, handler.as_ref(), finalizer.as_deref(), env),
            LStmtKind::CatchDispatch(dispatch) => self.exec_dispatch(dispatch, env),
            LStmtKind::Comment(_) => Ok(Completion::Normal),
        }
    }

    fn exec_switch(
        &mut self,
        subject: &LExpr,
        cases: &[SwitchCase],
        default: Option<&[LStmt]>,
        env: &Env,
    ) -> RuntimeResult<Completion> {
        let value = self.eval(subject, env)?;
        let start = cases.iter().position(|case| {
            case.values
                .iter()
                .any(|v| value.strict_eq(&Value::from(*v)))
        });
        let bodies: Vec<&[LStmt]> = match start {
            Some(i) => cases[i..]
                .iter()
                .map(|c| c.body.as_slice())
                .chain(default)
                .collect(),
            None => default.into_iter().collect(),
        };
        for body in bodies {
            match self.exec_block(body, env)? {
                Completion::Normal => {}
                Completion::Break(None) => return Ok(Completion::Normal),
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &mut self,
        body: &[LStmt],
        handler: Option<&CatchHandler>,
        finalizer: Option<&[LStmt]>,
        env: &Env,
    ) -> RuntimeResult<Completion> {
        let outcome = match (self.exec_block(body, env), handler) {
            (Err(RuntimeError::Thrown(value)), Some(handler)) => {
                env.borrow_mut()
                    .vars
                    .insert(handler.binding.clone(), value);
                self.exec_block(&handler.body, env)
            }
            (outcome, _) => outcome,
        };
        let Some(finalizer) = finalizer else {
            return outcome;
        };
        if matches!(outcome, Err(RuntimeError::Fault(_))) {
            return outcome;
        }
        match self.exec_block(finalizer, env)? {
            Completion::Normal => outcome,
            abrupt => Ok(abrupt),
        }
    }

    fn exec_dispatch(&mut self, dispatch: &CatchDispatch, env: &Env) -> RuntimeResult<Completion> {
        let subject = self.lookup(&dispatch.subject, env)?;
        for arm in &dispatch.arms {
            let matched = match &arm.test {
                ArmTest::Always => true,
                ArmTest::InstanceOf(ty) => subject
                    .class()
                    .is_some_and(|class| self.types.is_subtype(class, ty.id)),
            };
            if matched {
                return self.exec_block(&arm.body, env);
            }
        }
        if dispatch.rethrow {
            return Err(RuntimeError::Thrown(subject));
        }
        Ok(Completion::Normal)
    }

    fn eval_args(&mut self, args: &[LExpr], env: &Env) -> RuntimeResult<Vec<Value>> {
        args.iter().map(|a| self.eval(a, env)).collect()
    }

    fn eval(&mut self, expr: &LExpr, env: &Env) -> RuntimeResult<Value> {
        match &expr.kind {
            LExprKind::Literal(lit) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::from(*i),
                Literal::Float(f) => Value::Number(*f),
                Literal::Str(s) => Value::string(s),
            }),
            LExprKind::Ident(name) => self.lookup(name, env),
            LExprKind::Assign { target, value } => {
                let value = self.eval(value, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }
            LExprKind::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => Ok(left),
                    BinaryOp::Or if left.is_truthy() => Ok(left),
                    BinaryOp::And | BinaryOp::Or => self.eval(right, env),
                    _ => {
                        let right = self.eval(right, env)?;
                        binary(*op, &left, &right)
                    }
                }
            }
            LExprKind::Unary { op, operand } => {
                let operand = self.eval(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-number(&operand)?)),
                }
            }
            LExprKind::Call { callee, args } => {
                if let LExprKind::Member { object, name } = &callee.kind {
                    let receiver = self.eval(object, env)?;
                    let args = self.eval_args(args, env)?;
                    return self.call_method(&receiver, name, args);
                }
                let callee = self.eval(callee, env)?;
                let args = self.eval_args(args, env)?;
                self.call_value(&callee, args)
            }
            LExprKind::Member { object, name } => {
                let object = self.eval(object, env)?;
                if object.as_object().is_none() {
                    return Err(RuntimeError::fault(format!(
                        "cannot read '{}' of {}",
                        name,
                        object.type_name()
                    )));
                }
                Ok(object.field(name))
            }
            LExprKind::New { ty, args } => {
                let args = self.eval_args(args, env)?;
                let object = self.new_object(Some(ty.id));
                if let Some(message) = args.into_iter().next() {
                    object
                        .borrow_mut()
                        .fields
                        .insert("message".to_string(), message);
                }
                Ok(Value::Object(object))
            }
            LExprKind::Function { params, body } => Ok(Value::Function(Rc::new(Closure {
                name: "anonymous".to_string(),
                params: params.clone(),
                body: body.clone(),
                env: Some(env.clone()),
            }))),
            LExprKind::Runtime { helper, args } => {
                let args = self.eval_args(args, env)?;
                self.runtime_helper(*helper, args)
            }
        }
    }

    fn runtime_helper(&mut self, helper: RuntimeHelper, args: Vec<Value>) -> RuntimeResult<Value> {
        let methods: &[&str] = match helper {
            RuntimeHelper::MakeEnumerable => &["getEnumerator"],
            RuntimeHelper::MakeEnumerator => &["moveNext", "getCurrent", "dispose"],
        };
        if args.len() != methods.len() {
            return Err(RuntimeError::fault(format!(
                "{} expects {} arguments, got {}",
                helper.name(),
                methods.len(),
                args.len()
            )));
        }
        let object = self.new_object(None);
        {
            let mut object = object.borrow_mut();
            for (name, value) in methods.iter().zip(args) {
                object.fields.insert((*name).to_string(), value);
            }
        }
        Ok(Value::Object(object))
    }
}

fn loop_control(completion: Completion, label: &Option<String>) -> LoopControl {
    let own = |target: &Option<String>| target.is_none() || target == label;
    match completion {
        Completion::Normal => LoopControl::Next,
        Completion::Continue(target) if own(&target) => LoopControl::Next,
        Completion::Break(target) if own(&target) => LoopControl::Exit,
        other => LoopControl::Propagate(other),
    }
}

fn number(value: &Value) -> RuntimeResult<f64> {
    value.as_number().ok_or_else(|| {
        RuntimeError::fault(format!("expected a number, found {}", value.type_name()))
    })
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> RuntimeResult<Value> {
    let value = match op {
        BinaryOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::string(&format!("{}{}", left, right))
            }
            _ => Value::Number(number(left)? + number(right)?),
        },
        BinaryOp::Sub => Value::Number(number(left)? - number(right)?),
        BinaryOp::Mul => Value::Number(number(left)? * number(right)?),
        BinaryOp::Div => Value::Number(number(left)? / number(right)?),
        BinaryOp::Rem => Value::Number(number(left)? % number(right)?),
        BinaryOp::Eq => Value::Bool(left.strict_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => number(left)?.partial_cmp(&number(right)?),
            };
            let result = ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            });
            Value::Bool(result)
        }
        BinaryOp::And | BinaryOp::Or => {
            return Err(RuntimeError::fault("logical operator reached strict evaluation"))
        }
    };
    Ok(value)
}

/// Names declared with `var` anywhere in a function body, excluding nested
/// functions
fn collect_vars(stmts: &[LStmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match &stmt.kind {
            LStmtKind::Var { name, .. } => out.push(name.clone()),
            LStmtKind::Block(body)
            | LStmtKind::While { body, .. }
            | LStmtKind::DoWhile { body, .. }
            | LStmtKind::For { body, .. } => collect_vars(body, out),
            LStmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_vars(then_branch, out);
                if let Some(e) = else_branch {
                    collect_vars(e, out);
                }
            }
            LStmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    collect_vars(&case.body, out);
                }
                if let Some(d) = default {
                    collect_vars(d, out);
                }
            }
            LStmtKind::Try {
                body,
                handler,
                finalizer,
            } => {
                collect_vars(body, out);
                if let Some(h) = handler {
                    collect_vars(&h.body, out);
                }
                if let Some(f) = finalizer {
                    collect_vars(f, out);
                }
            }
            LStmtKind::CatchDispatch(dispatch) => {
                for arm in &dispatch.arms {
                    collect_vars(&arm.body, out);
                }
            }
            LStmtKind::Expr(_)
            | LStmtKind::Break(_)
            | LStmtKind::Continue(_)
            | LStmtKind::Return(_)
            | LStmtKind::Throw(_)
            | LStmtKind::Comment(_) => {}
        }
    }
}
