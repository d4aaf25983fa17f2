//! Compilation errors
//!
//! Everything here is fatal for the compilation unit it occurs in. Recoverable
//! findings (unreachable handlers) are diagnostics, see
//! [`diagnostic`](crate::compiler::diagnostic).

use crate::compiler::sourcemap::GeneratedPos;
use crate::syntax::{SourceId, Span};
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String, span: Span },

    #[error("Source map error: {0}")]
    Map(#[from] MapError),

    #[error("Internal compiler error: {message}")]
    Internal { message: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl CompileError {
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        CompileError::UnsupportedConstruct {
            construct: construct.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }

    /// Source position the error points at, when it has one
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::UnsupportedConstruct { span, .. } => Some(*span),
            _ => None,
        }
    }
}

/// Errors raised while building or reading a map document
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Position entries out of order: {found} follows {previous}")]
    OutOfOrder {
        previous: GeneratedPos,
        found: GeneratedPos,
    },

    #[error("Position entry refers to unknown source {0:?}")]
    UnknownSource(SourceId),

    #[error("Malformed mapping segment '{segment}'")]
    InvalidVlq { segment: String },

    #[error("Map JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_error_converts_into_compile_error() {
        let err: CompileError = MapError::OutOfOrder {
            previous: GeneratedPos::new(3, 4),
            found: GeneratedPos::new(2, 0),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Source map error: Position entries out of order: 2:0 follows 3:4"
        );
        assert!(err.span().is_none());
    }

    #[test]
    fn test_unsupported_construct_keeps_span() {
        let span = Span::at(SourceId(0), 7, 3);
        let err = CompileError::unsupported("goto statement", span);
        assert_eq!(err.span(), Some(span));
        assert_eq!(err.to_string(), "Unsupported construct: goto statement");
    }
}
