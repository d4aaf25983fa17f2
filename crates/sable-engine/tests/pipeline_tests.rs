use sable_engine::compiler::{CompileError, CompileOptions, Compiler, DiagnosticLevel};
use sable_engine::runtime::{Interpreter, Value};
use sable_engine::syntax::build::*;
use sable_engine::syntax::{CompilationUnit, FunctionDecl, Local, SourceId, Span, TypeTable};
use std::io::Write;

fn unit(name: &str, types: TypeTable, functions: Vec<FunctionDecl>) -> CompilationUnit {
    let mut unit = CompilationUnit::new(name);
    unit.types = types;
    unit.functions = functions;
    unit
}

fn squares() -> FunctionDecl {
    let n = Local::new(0, "n");
    let i = Local::new(1, "i");
    iterator(
        "squares",
        vec![n.clone()],
        vec![
            let_(&i, int(1)),
            while_(
                binary(sable_engine::syntax::BinaryOp::Le, local(&i), local(&n)),
                block(vec![
                    yield_return(binary(
                        sable_engine::syntax::BinaryOp::Mul,
                        local(&i),
                        local(&i),
                    )),
                    expr_stmt(increment(&i)),
                ]),
            ),
        ],
    )
}

// ============================================================================
// Emitted Text
// ============================================================================

#[test]
fn test_typed_catch_emits_ordered_type_tests() {
    let mut types = TypeTable::new();
    let a = types.declare("A", None);
    let b = types.declare("B", None);
    let f = function(
        "f",
        vec![],
        vec![try_(
            vec![expr_stmt(host_call("work", vec![]))],
            vec![
                catch_typed(b, None, vec![return_(Some(int(2)))]),
                catch_typed(a, None, vec![return_(Some(int(1)))]),
            ],
            None,
        )],
    );
    let compiled = Compiler::default()
        .compile(&unit("out.js", types, vec![f]))
        .unwrap();
    let code = &compiled.code;
    assert!(code.contains("} catch ($t1) {"));
    let b_test = code.find("$rt.isInstanceOf($t1, B)").unwrap();
    let a_test = code.find("$rt.isInstanceOf($t1, A)").unwrap();
    assert!(b_test < a_test);
    assert!(code.contains("throw $t1;"));
    assert_eq!(code.matches("catch (").count(), 1);
}

#[test]
fn test_iterator_emits_state_machine() {
    let compiled = Compiler::default()
        .compile(&unit("out.js", TypeTable::new(), vec![squares()]))
        .unwrap();
    let code = &compiled.code;
    assert!(code.starts_with("function squares($p_n) {"));
    assert!(code.contains("return $rt.makeEnumerable(function() {"));
    assert!(code.contains("var $state = 0;"));
    assert!(code.contains("var n = $p_n;"));
    assert!(code.contains("$rt.makeEnumerator("));
    assert!(code.contains("switch ($state) {"));
    assert!(code.contains("$sm0: for (;;) {"));
}

#[test]
fn test_compiled_output_runs() {
    let compiled = Compiler::default()
        .compile(&unit("out.js", TypeTable::new(), vec![squares()]))
        .unwrap();
    let mut interp = Interpreter::new(&compiled.lowered);
    let seq = interp.call("squares", vec![Value::from(4)]).unwrap();
    assert_eq!(
        interp.enumerate(&seq, None).unwrap(),
        vec![
            Value::from(1),
            Value::from(4),
            Value::from(9),
            Value::from(16)
        ]
    );
}

#[test]
fn test_operands_render_as_valid_script() {
    let x = Local::new(0, "x");
    let f = function(
        "f",
        vec![x.clone()],
        vec![
            expr_stmt(host_call("trace", vec![neg(neg(local(&x)))])),
            expr_stmt(host_call("trace", vec![neg(int(-1))])),
            return_(Some(method_call(int(5), "toString", vec![]))),
        ],
    );
    let compiled = Compiler::default()
        .compile(&unit("out.js", TypeTable::new(), vec![f]))
        .unwrap();
    assert_eq!(
        compiled.code,
        "function f(x) {\n    trace(-(-x));\n    trace(-(-1));\n    return (5).toString();\n}\n"
    );
}

#[test]
fn test_local_named_like_host_function_keeps_call_working() {
    let t = Local::new(0, "trace");
    let f = function(
        "f",
        vec![],
        vec![
            let_(&t, int(5)),
            expr_stmt(host_call("trace", vec![local(&t)])),
        ],
    );
    let compiled = Compiler::default()
        .compile(&unit("out.js", TypeTable::new(), vec![f]))
        .unwrap();
    assert!(compiled.code.contains("var trace_1 = 5;"));
    assert!(compiled.code.contains("trace(trace_1);"));

    let mut interp = Interpreter::new(&compiled.lowered);
    interp.call("f", vec![]).unwrap();
    assert_eq!(interp.trace(), &[Value::from(5)]);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_options_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
runtime_prefix = "Runtime"
indent_width = 2

[source_map]
enabled = false
"#
    )
    .unwrap();

    let options = CompileOptions::from_file(file.path()).unwrap();
    assert_eq!(options.indent_width, 2);
    let compiled = Compiler::new(options)
        .compile(&unit("out.js", TypeTable::new(), vec![squares()]))
        .unwrap();
    assert!(compiled.source_map.is_none());
    assert!(compiled.code.contains("\n  return Runtime.makeEnumerable("));
    assert!(!compiled.code.contains("$rt."));
}

#[test]
fn test_unknown_option_is_a_config_error() {
    let err = CompileOptions::from_toml_str("minify = true").unwrap_err();
    assert!(matches!(err, CompileError::Config { .. }));
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CompileOptions::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, CompileError::Config { .. }));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_diagnostics_render_with_source_snippet() {
    let mut types = TypeTable::new();
    let a = types.declare("A", None);
    let mut unit = unit("out.js", types, vec![]);
    let source = unit.sources.add(
        "Program.cs",
        "try {\n} catch {\n} catch (A e) {\n}\n",
    );
    let mut any = catch_any(None, vec![]);
    any.span = Span::at(source, 2, 3);
    let mut typed = catch_typed(a, None, vec![]);
    typed.span = Span::at(source, 3, 3);
    unit.functions.push(function(
        "f",
        vec![],
        vec![try_(vec![], vec![any, typed], None)],
    ));

    let compiled = Compiler::default().compile(&unit).unwrap();
    assert!(compiled.has_diagnostics());
    assert_eq!(compiled.diagnostics[0].level, DiagnosticLevel::Warning);
    assert_eq!(compiled.diagnostics[0].span.source, SourceId(0));

    let text = compiled.render_diagnostics(&unit.sources);
    assert!(text.contains("warning[W0101]"));
    assert!(text.contains("Program.cs"));
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn test_batch_keeps_input_order_and_isolates_failures() {
    let good = |name: &str| unit(name, TypeTable::new(), vec![squares()]);
    let bad = unit(
        "bad.js",
        TypeTable::new(),
        vec![iterator("broken", vec![], vec![yield_return(int(1)), goto("out")])],
    );
    let units = vec![good("a.js"), bad, good("c.js"), good("d.js")];
    let results = Compiler::default().compile_batch(&units);

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().name, "a.js");
    assert!(matches!(
        results[1],
        Err(CompileError::UnsupportedConstruct { .. })
    ));
    assert_eq!(results[2].as_ref().unwrap().name, "c.js");
    assert_eq!(results[3].as_ref().unwrap().name, "d.js");

    // Each unit compiles exactly as it would alone
    let alone = Compiler::default().compile(&units[2]).unwrap();
    assert_eq!(results[2].as_ref().unwrap().code, alone.code);
}

#[test]
fn test_empty_batch() {
    assert!(Compiler::default().compile_batch(&[]).is_empty());
}
