use sable_engine::compiler::{CompileError, Compiler};
use sable_engine::runtime::{Interpreter, Value};
use sable_engine::syntax::build::*;
use sable_engine::syntax::{
    BinaryOp, CompilationUnit, Expr, FunctionDecl, IteratorKind, Local, Stmt, TypeTable,
};

fn unit(types: TypeTable, functions: Vec<FunctionDecl>) -> CompilationUnit {
    let mut unit = CompilationUnit::new("iterators.js");
    unit.types = types;
    unit.functions = functions;
    unit
}

fn interpreter(functions: Vec<FunctionDecl>) -> Interpreter {
    let lowering = Compiler::default()
        .lower(&unit(TypeTable::new(), functions))
        .unwrap();
    Interpreter::new(&lowering.unit)
}

fn trace(value: Expr) -> Stmt {
    expr_stmt(host_call("trace", vec![value]))
}

fn numbers(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

/// `range(n)`: yields 0 .. n-1
fn range() -> FunctionDecl {
    let n = Local::new(0, "n");
    let i = Local::new(1, "i");
    iterator(
        "range",
        vec![n.clone()],
        vec![
            let_(&i, int(0)),
            while_(
                lt(local(&i), local(&n)),
                block(vec![yield_return(local(&i)), expr_stmt(increment(&i))]),
            ),
        ],
    )
}

/// Yields 1 and 2 inside a try whose finally traces "cleanup"
fn guarded() -> FunctionDecl {
    iterator(
        "guarded",
        vec![],
        vec![try_(
            vec![yield_return(int(1)), yield_return(int(2))],
            vec![],
            Some(vec![trace(string("cleanup"))]),
        )],
    )
}

// ============================================================================
// Deferred Execution
// ============================================================================

#[test]
fn test_body_does_not_run_until_first_move_next() {
    let f = iterator(
        "items",
        vec![],
        vec![
            trace(string("start")),
            yield_return(int(1)),
            yield_return(int(2)),
        ],
    );
    let mut interp = interpreter(vec![f]);
    let seq = interp.call("items", vec![]).unwrap();
    assert!(interp.trace().is_empty());

    let items = interp.enumerate(&seq, None).unwrap();
    assert_eq!(items, numbers(&[1, 2]));
    assert_eq!(interp.trace(), &[Value::from("start")]);
}

#[test]
fn test_current_is_null_before_first_move_next() {
    let mut interp = interpreter(vec![range()]);
    let seq = interp.call("range", vec![Value::from(2)]).unwrap();
    let e = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();
    assert_eq!(interp.call_method(&e, "getCurrent", vec![]).unwrap(), Value::Null);
}

#[test]
fn test_range_yields_in_order() {
    let mut interp = interpreter(vec![range()]);
    let seq = interp.call("range", vec![Value::from(4)]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[0, 1, 2, 3]));
}

#[test]
fn test_finished_enumerator_keeps_returning_false() {
    let mut interp = interpreter(vec![range()]);
    let seq = interp.call("range", vec![Value::from(1)]).unwrap();
    let e = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();
    assert_eq!(interp.call_method(&e, "moveNext", vec![]).unwrap(), Value::from(true));
    assert_eq!(interp.call_method(&e, "moveNext", vec![]).unwrap(), Value::from(false));
    assert_eq!(interp.call_method(&e, "moveNext", vec![]).unwrap(), Value::from(false));
}

// ============================================================================
// Restartability
// ============================================================================

#[test]
fn test_each_enumeration_starts_fresh() {
    let mut interp = interpreter(vec![range()]);
    let seq = interp.call("range", vec![Value::from(3)]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[0, 1, 2]));
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[0, 1, 2]));
}

#[test]
fn test_enumerators_of_one_sequence_are_independent() {
    let mut interp = interpreter(vec![range()]);
    let seq = interp.call("range", vec![Value::from(3)]).unwrap();
    let first = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();
    let second = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();

    interp.call_method(&first, "moveNext", vec![]).unwrap();
    interp.call_method(&first, "moveNext", vec![]).unwrap();
    interp.call_method(&second, "moveNext", vec![]).unwrap();

    assert_eq!(interp.call_method(&first, "getCurrent", vec![]).unwrap(), Value::from(1));
    assert_eq!(interp.call_method(&second, "getCurrent", vec![]).unwrap(), Value::from(0));
}

#[test]
fn test_enumerator_iterator_returns_single_enumerator() {
    let n = Local::new(0, "n");
    let f = enumerator(
        "countdown",
        vec![n.clone()],
        vec![while_(
            lt(int(0), local(&n)),
            block(vec![
                yield_return(local(&n)),
                expr_stmt(assign(&n, binary(BinaryOp::Sub, local(&n), int(1)))),
            ]),
        )],
    );
    let mut interp = interpreter(vec![f]);
    let e = interp.call("countdown", vec![Value::from(3)]).unwrap();
    assert!(matches!(e.field("getEnumerator"), Value::Undefined));
    assert_eq!(interp.enumerate(&e, None).unwrap(), numbers(&[3, 2, 1]));
}

// ============================================================================
// Unbounded Sequences
// ============================================================================

#[test]
fn test_unbounded_sequence_with_limit() {
    let i = Local::new(0, "i");
    let f = iterator(
        "naturals",
        vec![],
        vec![
            let_(&i, int(0)),
            while_(
                boolean(true),
                block(vec![yield_return(local(&i)), expr_stmt(increment(&i))]),
            ),
        ],
    );
    let mut interp = interpreter(vec![f]);
    let seq = interp.call("naturals", vec![]).unwrap();
    assert_eq!(
        interp.enumerate(&seq, Some(5)).unwrap(),
        numbers(&[0, 1, 2, 3, 4])
    );
}

// ============================================================================
// Control Flow
// ============================================================================

#[test]
fn test_break_and_continue_in_suspending_loop() {
    let i = Local::new(0, "i");
    let f = iterator(
        "filtered",
        vec![],
        vec![
            let_(&i, int(0)),
            while_(
                boolean(true),
                block(vec![
                    expr_stmt(increment(&i)),
                    if_(eq(local(&i), int(2)), continue_(), None),
                    if_(lt(int(4), local(&i)), break_(), None),
                    yield_return(local(&i)),
                ]),
            ),
        ],
    );
    let mut interp = interpreter(vec![f]);
    let seq = interp.call("filtered", vec![]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[1, 3, 4]));
}

#[test]
fn test_yield_in_both_branches() {
    let flag = Local::new(0, "flag");
    let f = iterator(
        "pick",
        vec![flag.clone()],
        vec![
            if_(
                local(&flag),
                yield_return(string("yes")),
                Some(yield_return(string("no"))),
            ),
            yield_return(string("done")),
        ],
    );
    let mut interp = interpreter(vec![f]);
    let yes = interp.call("pick", vec![Value::from(true)]).unwrap();
    let no = interp.call("pick", vec![Value::from(false)]).unwrap();
    assert_eq!(
        interp.enumerate(&yes, None).unwrap(),
        vec![Value::from("yes"), Value::from("done")]
    );
    assert_eq!(
        interp.enumerate(&no, None).unwrap(),
        vec![Value::from("no"), Value::from("done")]
    );
}

#[test]
fn test_for_loop_with_yield() {
    let i = Local::new(0, "i");
    let f = iterator(
        "evens",
        vec![],
        vec![for_(
            vec![let_(&i, int(0))],
            Some(lt(local(&i), int(6))),
            vec![assign(&i, add(local(&i), int(2)))],
            yield_return(local(&i)),
        )],
    );
    let mut interp = interpreter(vec![f]);
    let seq = interp.call("evens", vec![]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[0, 2, 4]));
}

#[test]
fn test_yield_break_stops_the_sequence() {
    let f = iterator(
        "short",
        vec![],
        vec![
            yield_return(int(1)),
            if_(boolean(true), yield_break(), None),
            yield_return(int(2)),
        ],
    );
    let mut interp = interpreter(vec![f]);
    let seq = interp.call("short", vec![]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[1]));
}

// ============================================================================
// Try Regions and Dispose
// ============================================================================

#[test]
fn test_finally_runs_once_after_full_enumeration() {
    let mut interp = interpreter(vec![guarded()]);
    let seq = interp.call("guarded", vec![]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[1, 2]));
    assert_eq!(interp.trace(), &[Value::from("cleanup")]);
}

#[test]
fn test_suspend_does_not_run_finally() {
    let mut interp = interpreter(vec![guarded()]);
    let seq = interp.call("guarded", vec![]).unwrap();
    let e = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();
    interp.call_method(&e, "moveNext", vec![]).unwrap();
    interp.call_method(&e, "moveNext", vec![]).unwrap();
    assert!(interp.trace().is_empty());
}

#[test]
fn test_dispose_runs_pending_finally_once() {
    let mut interp = interpreter(vec![guarded()]);
    let seq = interp.call("guarded", vec![]).unwrap();
    let e = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();
    interp.call_method(&e, "moveNext", vec![]).unwrap();

    interp.call_method(&e, "dispose", vec![]).unwrap();
    interp.call_method(&e, "dispose", vec![]).unwrap();
    assert_eq!(interp.trace(), &[Value::from("cleanup")]);
    assert_eq!(interp.call_method(&e, "moveNext", vec![]).unwrap(), Value::from(false));
}

#[test]
fn test_dispose_before_start_runs_nothing() {
    let mut interp = interpreter(vec![guarded()]);
    let seq = interp.call("guarded", vec![]).unwrap();
    let e = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();
    interp.call_method(&e, "dispose", vec![]).unwrap();
    assert!(interp.trace().is_empty());
    assert_eq!(interp.call_method(&e, "moveNext", vec![]).unwrap(), Value::from(false));
}

#[test]
fn test_early_exit_from_foreach_disposes() {
    let x = Local::new(0, "x");
    let consume = function(
        "consume",
        vec![],
        vec![foreach(
            &x,
            call("guarded", vec![]),
            block(vec![trace(local(&x)), break_()]),
        )],
    );
    let mut interp = interpreter(vec![guarded(), consume]);
    interp.call("consume", vec![]).unwrap();
    assert_eq!(interp.trace(), &[Value::from(1), Value::from("cleanup")]);
}

#[test]
fn test_yield_break_inside_region_runs_finally() {
    let f = iterator(
        "stop",
        vec![],
        vec![try_(
            vec![yield_return(int(1)), yield_break(), yield_return(int(2))],
            vec![],
            Some(vec![trace(string("cleanup"))]),
        )],
    );
    let mut interp = interpreter(vec![f]);
    let seq = interp.call("stop", vec![]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[1]));
    assert_eq!(interp.trace(), &[Value::from("cleanup")]);
}

#[test]
fn test_nested_regions_dispose_innermost_first() {
    let f = iterator(
        "nested",
        vec![],
        vec![try_(
            vec![try_(
                vec![yield_return(int(1))],
                vec![],
                Some(vec![trace(string("inner"))]),
            )],
            vec![],
            Some(vec![trace(string("outer"))]),
        )],
    );
    let mut interp = interpreter(vec![f]);
    let seq = interp.call("nested", vec![]).unwrap();

    assert_eq!(interp.enumerate(&seq, Some(1)).unwrap(), numbers(&[1]));
    assert_eq!(
        interp.take_trace(),
        vec![Value::from("inner"), Value::from("outer")]
    );

    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[1]));
    assert_eq!(
        interp.take_trace(),
        vec![Value::from("inner"), Value::from("outer")]
    );
}

#[test]
fn test_catch_around_suspend_point() {
    let mut types = TypeTable::new();
    let failure = types.declare("Failure", None);
    let f = iterator(
        "recovering",
        vec![],
        vec![
            try_(
                vec![yield_return(int(1)), throw(new_object(failure, vec![]))],
                vec![catch_typed(failure, None, vec![trace(string("caught"))])],
                None,
            ),
            yield_return(int(2)),
        ],
    );
    let lowering = Compiler::default().lower(&unit(types, vec![f])).unwrap();
    let mut interp = Interpreter::new(&lowering.unit);
    let seq = interp.call("recovering", vec![]).unwrap();
    assert_eq!(interp.enumerate(&seq, None).unwrap(), numbers(&[1, 2]));
    assert_eq!(interp.trace(), &[Value::from("caught")]);
}

#[test]
fn test_exception_escaping_move_next_finishes_machine() {
    let mut types = TypeTable::new();
    let failure = types.declare("Failure", None);
    let f = iterator(
        "failing",
        vec![],
        vec![yield_return(int(1)), throw(new_object(failure, vec![]))],
    );
    let lowering = Compiler::default().lower(&unit(types, vec![f])).unwrap();
    let mut interp = Interpreter::new(&lowering.unit);
    let seq = interp.call("failing", vec![]).unwrap();
    let e = interp.call_method(&seq, "getEnumerator", vec![]).unwrap();
    interp.call_method(&e, "moveNext", vec![]).unwrap();
    assert!(interp.call_method(&e, "moveNext", vec![]).is_err());
    assert_eq!(interp.call_method(&e, "moveNext", vec![]).unwrap(), Value::from(false));
}

// ============================================================================
// Descriptors
// ============================================================================

#[test]
fn test_descriptor_records_states_and_hoisting() {
    let compiled = Compiler::default()
        .compile(&unit(TypeTable::new(), vec![range(), guarded()]))
        .unwrap();
    assert_eq!(compiled.iterators.len(), 2);

    let range = &compiled.iterators[0];
    assert_eq!(range.function, "range");
    assert_eq!(range.kind, IteratorKind::Enumerable);
    assert_eq!(range.suspend_points.len(), 1);
    assert!(range.hoisted.iter().any(|h| h.name == "n" && h.parameter));
    assert!(range.hoisted.iter().any(|h| h.name == "i" && !h.parameter));
    assert!(range.regions.is_empty());

    let guarded = &compiled.iterators[1];
    assert_eq!(guarded.regions.len(), 1);
    assert_eq!(guarded.regions[0].finally_function.as_deref(), Some("$finally1"));
    for point in &guarded.suspend_points {
        assert_eq!(guarded.finally_owed(point.resume_state), vec!["$finally1".to_string()]);
    }

    let dump = compiled.describe_iterators();
    assert!(dump.contains("iterator range (enumerable"));
    assert!(dump.contains("iterator guarded (enumerable"));
}

// ============================================================================
// Unsupported Constructs
// ============================================================================

fn lower_error(f: FunctionDecl) -> CompileError {
    Compiler::default()
        .lower(&unit(TypeTable::new(), vec![f]))
        .err()
        .unwrap()
}

#[test]
fn test_yield_inside_catch_is_rejected() {
    let err = lower_error(iterator(
        "f",
        vec![],
        vec![try_(vec![], vec![catch_any(None, vec![yield_return(int(1))])], None)],
    ));
    assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    assert!(err.to_string().contains("yield inside a catch clause"));
}

#[test]
fn test_yield_inside_finally_is_rejected() {
    let err = lower_error(iterator(
        "f",
        vec![],
        vec![try_(vec![], vec![], Some(vec![yield_return(int(1))]))],
    ));
    assert!(err.to_string().contains("yield inside a finally clause"));
}

#[test]
fn test_return_inside_iterator_is_rejected() {
    let err = lower_error(iterator(
        "f",
        vec![],
        vec![yield_return(int(1)), return_(None)],
    ));
    assert!(err.to_string().contains("return statement in an iterator body"));
}

#[test]
fn test_goto_inside_iterator_is_rejected() {
    let err = lower_error(iterator("f", vec![], vec![yield_return(int(1)), goto("end")]));
    assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    assert!(err.to_string().contains("goto"));
}
