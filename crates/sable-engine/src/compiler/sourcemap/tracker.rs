//! Position tracker
//!
//! Collects one [`PositionEntry`] per emitted unit, pairing the generated
//! coordinate reported by the emitter with the unit's original position.
//! The entry stream is owned by the single emission pass that fills it and is
//! handed to the encoder by value.

use crate::compiler::ir::Origin;
use crate::syntax::SourceId;
use std::fmt;

/// 0-based generated coordinate (column in UTF-16 code units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GeneratedPos {
    pub line: u32,
    pub column: u32,
}

impl GeneratedPos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for GeneratedPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 0-based original coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginalPos {
    pub source: SourceId,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

impl From<&Origin> for OriginalPos {
    fn from(origin: &Origin) -> Self {
        OriginalPos {
            source: origin.source,
            line: origin.line.saturating_sub(1),
            column: origin.column.saturating_sub(1),
            name: origin.name.clone(),
        }
    }
}

/// One generated-to-original correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionEntry {
    pub generated: GeneratedPos,
    /// `None` for synthetic output with no source counterpart
    pub original: Option<OriginalPos>,
}

/// Receives the generated position of each unit the emitter writes
pub trait PositionSink {
    fn record(&mut self, generated: GeneratedPos, origin: Option<&Origin>);
}

/// Discards positions (plain rendering without a map)
impl PositionSink for () {
    fn record(&mut self, _generated: GeneratedPos, _origin: Option<&Origin>) {}
}

/// Accumulates position entries in emission order
#[derive(Debug, Default)]
pub struct PositionTracker {
    entries: Vec<PositionEntry>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand the stream off to the encoder
    pub fn into_entries(self) -> Vec<PositionEntry> {
        self.entries
    }
}

impl PositionSink for PositionTracker {
    fn record(&mut self, generated: GeneratedPos, origin: Option<&Origin>) {
        self.entries.push(PositionEntry {
            generated,
            original: origin.map(OriginalPos::from),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_converts_to_zero_based() {
        let origin = Origin {
            source: SourceId(2),
            line: 1,
            column: 1,
            name: Some("x".to_string()),
        };
        let pos = OriginalPos::from(&origin);
        assert_eq!((pos.line, pos.column), (0, 0));
        assert_eq!(pos.source, SourceId(2));
        assert_eq!(pos.name.as_deref(), Some("x"));
    }

    #[test]
    fn test_tracker_keeps_emission_order() {
        let mut tracker = PositionTracker::new();
        tracker.record(GeneratedPos::new(0, 0), None);
        tracker.record(GeneratedPos::new(0, 4), None);
        let entries = tracker.into_entries();
        assert_eq!(entries[0].generated, GeneratedPos::new(0, 0));
        assert_eq!(entries[1].generated, GeneratedPos::new(0, 4));
    }
}
