//! Source locations
//!
//! Every resolved syntax node carries a `Span` naming the source file it came
//! from plus its byte range and 1-based line/column of its first character.

use std::fmt;

/// Index of a source file inside a [`SourceSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(pub u32);

impl SourceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Location of a syntactic unit in its source file.
///
/// `line` and `column` are 1-based; a zero line marks a span that was never
/// attached to real source text (see [`Span::is_synthetic`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub source: SourceId,
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(source: SourceId, start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            source,
            start,
            end,
            line,
            column,
        }
    }

    /// A span with only a line/column position and no byte range
    pub fn at(source: SourceId, line: u32, column: u32) -> Self {
        Self {
            source,
            start: 0,
            end: 0,
            line,
            column,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            column: self.column.min(other.column),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source.0, self.line, self.column)
    }
}

/// A source file known to the compilation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path as it should appear in the source map
    pub path: String,
    /// Full text, used for diagnostics and optional source embedding
    pub text: String,
}

/// The ordered set of source files a compilation unit was built from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    files: Vec<SourceFile>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id
    pub fn add(&mut self, path: impl Into<String>, text: impl Into<String>) -> SourceId {
        let id = SourceId(self.files.len() as u32);
        self.files.push(SourceFile {
            path: path.into(),
            text: text.into(),
        });
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&SourceFile> {
        self.files.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &SourceFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (SourceId(i as u32), f))
    }
}
