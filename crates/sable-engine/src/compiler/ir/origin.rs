//! Original-source positions carried by lowered nodes
//!
//! The emitter reports these to the position tracker as it writes each unit;
//! lowering itself never deals with generated coordinates.

use crate::syntax::{SourceId, Span};

/// Where a lowered node came from in the original source (1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub source: SourceId,
    pub line: u32,
    pub column: u32,
    /// Source identifier, for the map's name table
    pub name: Option<String>,
}

impl Origin {
    /// The origin of a span, or `None` for synthetic spans
    pub fn from_span(span: Span) -> Option<Origin> {
        if span.is_synthetic() {
            return None;
        }
        Some(Origin {
            source: span.source,
            line: span.line,
            column: span.column,
            name: None,
        })
    }

    /// Like [`Origin::from_span`], recording the identifier written there
    pub fn named(span: Span, name: impl Into<String>) -> Option<Origin> {
        Self::from_span(span).map(|o| Origin {
            name: Some(name.into()),
            ..o
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_span_has_no_origin() {
        assert_eq!(Origin::from_span(Span::default()), None);
    }

    #[test]
    fn test_named_origin() {
        let origin = Origin::named(Span::at(SourceId(1), 4, 9), "count").unwrap();
        assert_eq!(origin.source, SourceId(1));
        assert_eq!((origin.line, origin.column), (4, 9));
        assert_eq!(origin.name.as_deref(), Some("count"));
    }
}
