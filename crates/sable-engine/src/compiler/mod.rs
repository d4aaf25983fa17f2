//! Sable compiler core
//!
//! Lowers resolved syntax trees into script text plus a source map:
//!
//! ```text
//! CompilationUnit → lower (exception + iterator engines) → LoweredUnit
//!                 → emit (Renderer + PositionTracker)    → code + entries
//!                 → MapEncoder                           → MapDocument
//! ```
//!
//! Each unit is compiled independently. A fatal error aborts only the unit it
//! occurs in; recoverable findings are returned with the unit's output.

pub mod diagnostic;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lower;
pub mod options;
pub mod sourcemap;

pub use diagnostic::{render_diagnostics, DiagnosticLevel, ErrorCode, LowerDiagnostic};
pub use error::{CompileError, CompileResult, MapError};
pub use ir::{LExpr, LFunction, LStmt, LoweredUnit, PrettyPrint};
pub use lower::{IteratorStateDescriptor, Lowerer, Lowering};
pub use options::{CompileOptions, SourceMapOptions};
pub use sourcemap::{MapDocument, MapEncoder, PositionSink, PositionTracker};

use crate::syntax::{CompilationUnit, SourceSet};
use emit::Renderer;

/// Output of one successfully compiled unit
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub name: String,
    /// Generated script text
    pub code: String,
    /// `None` when source maps are disabled
    pub source_map: Option<MapDocument>,
    pub lowered: LoweredUnit,
    /// Recoverable findings, in discovery order
    pub diagnostics: Vec<LowerDiagnostic>,
    pub iterators: Vec<IteratorStateDescriptor>,
}

impl CompiledUnit {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Diagnostics rendered against the unit's sources, without colour
    pub fn render_diagnostics(&self, sources: &SourceSet) -> String {
        render_diagnostics(&self.diagnostics, sources)
    }

    /// Debug dump of every iterator state machine in the unit
    pub fn describe_iterators(&self) -> String {
        self.iterators
            .iter()
            .map(IteratorStateDescriptor::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Compilation driver
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Run both lowering engines without emitting text
    pub fn lower(&self, unit: &CompilationUnit) -> CompileResult<Lowering> {
        Lowerer::new(unit)
            .reserve(self.options.runtime_prefix.clone())
            .lower_unit()
    }

    /// Lower, emit and (optionally) build the source map for one unit
    pub fn compile(&self, unit: &CompilationUnit) -> CompileResult<CompiledUnit> {
        let span = tracing::debug_span!("compile_unit", unit = %unit.name);
        let _guard = span.enter();

        self.options.validate()?;
        let lowering = self.lower(unit)?;

        let map_options = &self.options.source_map;
        let (code, source_map) = if map_options.enabled {
            let mut tracker = PositionTracker::new();
            let code = self.render(&lowering.unit, &mut tracker);
            let file = map_options
                .file
                .clone()
                .unwrap_or_else(|| unit.name.clone());
            tracing::trace!(positions = tracker.len(), "recorded positions");
            let map = MapEncoder::new(file)
                .with_source_root(map_options.source_root.clone())
                .embed_sources(map_options.embed_sources)
                .encode(tracker.into_entries(), &unit.sources)?;
            (code, Some(map))
        } else {
            (self.render(&lowering.unit, &mut ()), None)
        };

        tracing::debug!(
            functions = lowering.unit.function_count(),
            iterators = lowering.iterators.len(),
            diagnostics = lowering.diagnostics.len(),
            bytes = code.len(),
            "compiled unit"
        );

        Ok(CompiledUnit {
            name: unit.name.clone(),
            code,
            source_map,
            lowered: lowering.unit,
            diagnostics: lowering.diagnostics,
            iterators: lowering.iterators,
        })
    }

    /// Compile independent units on a fixed pool of worker threads. Results
    /// come back in input order; one unit failing never affects another.
    pub fn compile_batch(&self, units: &[CompilationUnit]) -> Vec<CompileResult<CompiledUnit>> {
        let workers = self.worker_count(units.len());
        let (job_tx, job_rx) = crossbeam::channel::bounded::<(usize, &CompilationUnit)>(workers);
        let (result_tx, result_rx) = crossbeam::channel::unbounded();

        let scoped = crossbeam::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    for (index, unit) in job_rx.iter() {
                        let _ = result_tx.send((index, self.compile(unit)));
                    }
                });
            }
            drop(job_rx);
            for job in units.iter().enumerate() {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);
        });
        drop(result_tx);
        if scoped.is_err() {
            tracing::warn!("a compilation worker panicked");
        }
        tracing::debug!(units = units.len(), workers, "compiled batch");

        let mut results: Vec<Option<CompileResult<CompiledUnit>>> =
            units.iter().map(|_| None).collect();
        for (index, result) in result_rx.iter() {
            results[index] = Some(result);
        }
        results
            .into_iter()
            .zip(units)
            .map(|(result, unit)| {
                result.unwrap_or_else(|| {
                    Err(CompileError::internal(format!(
                        "compilation of unit '{}' did not complete",
                        unit.name
                    )))
                })
            })
            .collect()
    }

    fn worker_count(&self, units: usize) -> usize {
        let configured = match self.options.batch_workers {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        configured.min(units).max(1)
    }

    fn render<S: PositionSink>(&self, unit: &LoweredUnit, sink: &mut S) -> String {
        let mut renderer = Renderer::new(
            sink,
            self.options.runtime_prefix.clone(),
            self.options.indent_width,
        );
        renderer.render_unit(unit);
        renderer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::build::*;
    use crate::syntax::{FunctionDecl, Local, SourceId, Span};

    fn unit_with(name: &str, functions: Vec<FunctionDecl>) -> CompilationUnit {
        let mut unit = CompilationUnit::new(name);
        unit.sources.add("main.cs", "class Program {}\n");
        unit.functions = functions;
        unit
    }

    #[test]
    fn test_compile_produces_code_and_map() {
        let x = Local::new(0, "x");
        let unit = unit_with(
            "main.js",
            vec![FunctionDecl {
                span: Span::at(SourceId(0), 1, 1),
                ..function(
                    "main",
                    vec![],
                    vec![let_(&x, int(1)).at(Span::at(SourceId(0), 1, 1))],
                )
            }],
        );
        let compiled = Compiler::default().compile(&unit).unwrap();
        assert_eq!(compiled.code, "function main() {\n    var x = 1;\n}\n");
        let map = compiled.source_map.unwrap();
        assert_eq!(map.file, "main.js");
        assert_eq!(map.sources, vec!["main.cs".to_string()]);
        assert!(map.names.contains(&"main".to_string()));
    }

    #[test]
    fn test_disabled_source_map() {
        let mut options = CompileOptions::default();
        options.source_map.enabled = false;
        let unit = unit_with("a.js", vec![function("a", vec![], vec![])]);
        let compiled = Compiler::new(options).compile(&unit).unwrap();
        assert!(compiled.source_map.is_none());
        assert_eq!(compiled.code, "function a() {\n}\n");
    }

    #[test]
    fn test_invalid_options_fail_the_unit() {
        let options = CompileOptions {
            runtime_prefix: "not valid".to_string(),
            ..CompileOptions::default()
        };
        let unit = unit_with("a.js", vec![]);
        let err = Compiler::new(options).compile(&unit).unwrap_err();
        assert!(matches!(err, CompileError::Config { .. }));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let good = unit_with("good.js", vec![function("ok", vec![], vec![])]);
        let bad = unit_with("bad.js", vec![function("broken", vec![], vec![goto("out")])]);
        let results = Compiler::default().compile_batch(&[good.clone(), bad, good]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CompileError::UnsupportedConstruct { .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().name, "good.js");
    }

    #[test]
    fn test_worker_count_is_bounded() {
        let compiler = Compiler::new(CompileOptions {
            batch_workers: 3,
            ..CompileOptions::default()
        });
        assert_eq!(compiler.worker_count(10), 3);
        assert_eq!(compiler.worker_count(2), 2);
        assert_eq!(compiler.worker_count(0), 1);
        assert!(Compiler::default().worker_count(64) >= 1);
    }

    #[test]
    fn test_batch_larger_than_pool_keeps_order() {
        let compiler = Compiler::new(CompileOptions {
            batch_workers: 2,
            ..CompileOptions::default()
        });
        let units: Vec<_> = (0..9)
            .map(|i| unit_with(&format!("u{}.js", i), vec![function("f", vec![], vec![])]))
            .collect();
        let results = compiler.compile_batch(&units);
        assert_eq!(results.len(), 9);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap().name, format!("u{}.js", i));
        }
    }

    #[test]
    fn test_locals_avoid_runtime_prefix() {
        let options = CompileOptions {
            runtime_prefix: "Runtime".to_string(),
            ..CompileOptions::default()
        };
        let local = Local::new(0, "Runtime");
        let unit = unit_with(
            "a.js",
            vec![function("f", vec![], vec![let_(&local, int(1))])],
        );
        let compiled = Compiler::new(options).compile(&unit).unwrap();
        assert!(compiled.code.contains("var Runtime_1 = 1;"));
    }
}
