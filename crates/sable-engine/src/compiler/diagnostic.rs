//! Diagnostic infrastructure for lowering reports
//!
//! Lowering collects warning-level findings per unit and keeps going; fatal
//! errors are converted into the same record shape so a driver can render
//! both the same way.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::NoColor;
use std::fmt;
use std::ops::Range;

use crate::compiler::error::CompileError;
use crate::syntax::{SourceFile, SourceSet, Span};

/// Stable diagnostic code (e.g., "W0101")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub const UNREACHABLE_HANDLER: ErrorCode = ErrorCode("W0101");
    pub const DUPLICATE_HANDLER: ErrorCode = ErrorCode("W0102");
    pub const UNSUPPORTED_CONSTRUCT: ErrorCode = ErrorCode("E0201");
    pub const ENCODER_CONTRACT: ErrorCode = ErrorCode("E0301");
    pub const INTERNAL: ErrorCode = ErrorCode("E0901");
    pub const CONFIG: ErrorCode = ErrorCode("E0902");

    pub fn as_str(&self) -> &str {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

impl DiagnosticLevel {
    fn severity(self) -> Severity {
        match self {
            DiagnosticLevel::Warning => Severity::Warning,
            DiagnosticLevel::Error => Severity::Error,
        }
    }
}

/// A secondary location attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedSpan {
    pub span: Span,
    pub message: String,
}

/// One lowering finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerDiagnostic {
    pub level: DiagnosticLevel,
    pub code: ErrorCode,
    pub message: String,
    /// Primary location; synthetic spans render without a source snippet
    pub span: Span,
    pub label: String,
    pub related: Vec<RelatedSpan>,
    pub notes: Vec<String>,
}

impl LowerDiagnostic {
    pub fn warning(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticLevel::Warning, code, message, span)
    }

    pub fn error(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticLevel::Error, code, message, span)
    }

    fn new(level: DiagnosticLevel, code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        LowerDiagnostic {
            level,
            code,
            message: message.into(),
            span,
            label: String::new(),
            related: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Set the text shown under the primary location
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a secondary label (related location)
    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedSpan {
            span,
            message: message.into(),
        });
        self
    }

    /// Add a note (additional context)
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    /// Create diagnostic from a fatal CompileError
    pub fn from_compile_error(error: &CompileError) -> Self {
        match error {
            CompileError::UnsupportedConstruct { construct, span } => {
                LowerDiagnostic::error(
                    ErrorCode::UNSUPPORTED_CONSTRUCT,
                    format!("unsupported construct: {}", construct),
                    *span,
                )
                .with_label("cannot be lowered")
                .with_note("no output is produced for this compilation unit")
            }
            CompileError::Map(err) => LowerDiagnostic::error(
                ErrorCode::ENCODER_CONTRACT,
                format!("source map encoding failed: {}", err),
                Span::default(),
            )
            .with_note("this is a compiler bug, not a problem in the source program"),
            CompileError::Internal { message } => LowerDiagnostic::error(
                ErrorCode::INTERNAL,
                format!("internal compiler error: {}", message),
                Span::default(),
            ),
            CompileError::Config { message } => LowerDiagnostic::error(
                ErrorCode::CONFIG,
                format!("invalid configuration: {}", message),
                Span::default(),
            ),
        }
    }

    /// Convert to a codespan diagnostic whose file ids are source indices
    pub fn to_codespan(&self, sources: &SourceSet) -> CsDiagnostic<usize> {
        let mut labels = Vec::new();
        if let Some(range) = label_range(self.span, sources) {
            labels.push(
                Label::primary(self.span.source.index(), range).with_message(self.label.clone()),
            );
        }
        for related in &self.related {
            if let Some(range) = label_range(related.span, sources) {
                labels.push(
                    Label::secondary(related.span.source.index(), range)
                        .with_message(related.message.clone()),
                );
            }
        }
        CsDiagnostic::new(self.level.severity())
            .with_message(self.message.clone())
            .with_code(self.code.0)
            .with_labels(labels)
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for LowerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        };
        write!(f, "{}[{}]: {}", level, self.code, self.message)?;
        if !self.span.is_synthetic() {
            write!(f, " at {}:{}", self.span.line, self.span.column)?;
        }
        Ok(())
    }
}

/// Byte range of a span, computing it from line/column when the span was
/// built without offsets.
fn label_range(span: Span, sources: &SourceSet) -> Option<Range<usize>> {
    if span.is_synthetic() {
        return None;
    }
    let file = sources.get(span.source)?;
    if span.end > span.start && span.end <= file.text.len() {
        return Some(span.start..span.end);
    }
    let offset = line_column_offset(file, span.line, span.column)?;
    Some(offset..offset)
}

fn line_column_offset(file: &SourceFile, line: u32, column: u32) -> Option<usize> {
    let line_start = if line <= 1 {
        0
    } else {
        file.text
            .match_indices('\n')
            .nth(line as usize - 2)
            .map(|(i, _)| i + 1)?
    };
    let rest = &file.text[line_start..];
    let column_offset = rest
        .char_indices()
        .nth(column.saturating_sub(1) as usize)
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    Some(line_start + column_offset)
}

/// Render diagnostics as plain text with source snippets
pub fn render_diagnostics(diagnostics: &[LowerDiagnostic], sources: &SourceSet) -> String {
    let mut files = SimpleFiles::new();
    for (_, file) in sources.iter() {
        files.add(file.path.clone(), file.text.clone());
    }
    let config = term::Config::default();
    let mut writer = NoColor::new(Vec::new());
    for diagnostic in diagnostics {
        let cs = diagnostic.to_codespan(sources);
        if term::emit(&mut writer, &config, &files, &cs).is_err() {
            tracing::debug!(code = %diagnostic.code, "falling back to plain diagnostic text");
            let fallback = format!("{}\n", diagnostic);
            writer.get_mut().extend_from_slice(fallback.as_bytes());
        }
    }
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}
