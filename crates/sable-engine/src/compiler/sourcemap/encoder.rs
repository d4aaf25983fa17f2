//! Map encoder
//!
//! Consumes the full position stream of one output unit and produces the
//! delta-encoded [`MapDocument`]. The stream must be in non-decreasing
//! generated order; anything else is an emitter bug and fails the unit.

use super::document::{MapDocument, MAP_VERSION};
use super::tracker::{GeneratedPos, OriginalPos, PositionEntry};
use super::vlq;
use crate::compiler::error::MapError;
use crate::syntax::{SourceId, SourceSet};
use rustc_hash::FxHashMap;

/// Encoder settings for one output unit
#[derive(Debug, Clone)]
pub struct MapEncoder {
    file: String,
    source_root: Option<String>,
    embed_sources: bool,
}

/// Running "previous value" state shared by all segments of a document
#[derive(Default)]
struct DeltaState {
    source: i64,
    line: i64,
    column: i64,
    name: i64,
}

impl MapEncoder {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source_root: None,
            embed_sources: false,
        }
    }

    pub fn with_source_root(mut self, root: Option<String>) -> Self {
        self.source_root = root;
        self
    }

    pub fn embed_sources(mut self, embed: bool) -> Self {
        self.embed_sources = embed;
        self
    }

    pub fn encode(
        &self,
        entries: Vec<PositionEntry>,
        sources: &SourceSet,
    ) -> Result<MapDocument, MapError> {
        check_monotonic(&entries)?;

        let mut source_indices: FxHashMap<SourceId, u32> = FxHashMap::default();
        let mut source_order: Vec<SourceId> = Vec::new();
        let mut name_indices: FxHashMap<String, u32> = FxHashMap::default();
        let mut names: Vec<String> = Vec::new();

        let mut lines: Vec<Vec<PositionEntry>> = Vec::new();
        for entry in entries {
            let line = entry.generated.line as usize;
            if lines.len() <= line {
                lines.resize_with(line + 1, Vec::new);
            }
            lines[line].push(entry);
        }

        let mut state = DeltaState::default();
        let mut mappings = String::new();
        let mut segment_count = 0usize;

        for (i, line) in lines.iter_mut().enumerate() {
            if i > 0 {
                mappings.push(';');
            }
            // Stable: equal columns keep the order they were reported in
            line.sort_by_key(|e| e.generated.column);

            let mut prev_column = 0i64;
            for (j, entry) in line.iter().enumerate() {
                if j > 0 {
                    mappings.push(',');
                }
                let column = entry.generated.column as i64;
                vlq::encode(column - prev_column, &mut mappings);
                prev_column = column;

                if let Some(original) = &entry.original {
                    let source_index = match source_indices.get(&original.source) {
                        Some(&index) => index,
                        None => {
                            if sources.get(original.source).is_none() {
                                return Err(MapError::UnknownSource(original.source));
                            }
                            let index = source_order.len() as u32;
                            source_indices.insert(original.source, index);
                            source_order.push(original.source);
                            index
                        }
                    };
                    let name_index = original.name.as_ref().map(|name| {
                        *name_indices.entry(name.clone()).or_insert_with(|| {
                            names.push(name.clone());
                            (names.len() - 1) as u32
                        })
                    });
                    encode_original(&mut state, source_index, original, name_index, &mut mappings);
                }
                segment_count += 1;
            }
        }

        tracing::trace!(
            file = %self.file,
            segments = segment_count,
            lines = lines.len(),
            sources = source_order.len(),
            "encoded source map"
        );

        let source_files: Vec<_> = source_order
            .iter()
            .filter_map(|id| sources.get(*id))
            .collect();
        let sources_content = self
            .embed_sources
            .then(|| source_files.iter().map(|f| Some(f.text.clone())).collect());

        Ok(MapDocument {
            version: MAP_VERSION,
            file: self.file.clone(),
            source_root: self.source_root.clone(),
            sources: source_files.iter().map(|f| f.path.clone()).collect(),
            sources_content,
            names,
            mappings,
        })
    }
}

fn check_monotonic(entries: &[PositionEntry]) -> Result<(), MapError> {
    let mut previous: Option<GeneratedPos> = None;
    for entry in entries {
        if let Some(prev) = previous {
            if entry.generated < prev {
                return Err(MapError::OutOfOrder {
                    previous: prev,
                    found: entry.generated,
                });
            }
        }
        previous = Some(entry.generated);
    }
    Ok(())
}

fn encode_original(
    state: &mut DeltaState,
    source_index: u32,
    original: &OriginalPos,
    name_index: Option<u32>,
    out: &mut String,
) {
    let source = source_index as i64;
    let line = original.line as i64;
    let column = original.column as i64;
    vlq::encode(source - state.source, out);
    vlq::encode(line - state.line, out);
    vlq::encode(column - state.column, out);
    state.source = source;
    state.line = line;
    state.column = column;
    if let Some(name) = name_index {
        let name = name as i64;
        vlq::encode(name - state.name, out);
        state.name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line: u32, column: u32, original: Option<(u32, u32, u32)>) -> PositionEntry {
        PositionEntry {
            generated: GeneratedPos::new(line, column),
            original: original.map(|(source, line, column)| OriginalPos {
                source: SourceId(source),
                line,
                column,
                name: None,
            }),
        }
    }

    fn sources() -> SourceSet {
        let mut set = SourceSet::new();
        set.add("a.cs", "A");
        set.add("b.cs", "B");
        set
    }

    #[test]
    fn test_encode_simple_document() {
        let doc = MapEncoder::new("out.js")
            .encode(
                vec![
                    entry(0, 0, Some((0, 0, 0))),
                    entry(0, 4, Some((0, 0, 4))),
                    entry(2, 2, Some((0, 1, 0))),
                ],
                &sources(),
            )
            .unwrap();
        assert_eq!(doc.mappings, "AAAA,IAAI;;EACJ");
        assert_eq!(doc.sources, vec!["a.cs".to_string()]);
        assert_eq!(doc.version, 3);
    }

    #[test]
    fn test_sources_listed_in_first_reference_order() {
        let doc = MapEncoder::new("out.js")
            .embed_sources(true)
            .encode(
                vec![entry(0, 0, Some((1, 0, 0))), entry(1, 0, Some((0, 0, 0)))],
                &sources(),
            )
            .unwrap();
        assert_eq!(doc.sources, vec!["b.cs".to_string(), "a.cs".to_string()]);
        assert_eq!(
            doc.sources_content,
            Some(vec![Some("B".to_string()), Some("A".to_string())])
        );
    }

    #[test]
    fn test_synthetic_segment_has_one_field() {
        let doc = MapEncoder::new("out.js")
            .encode(vec![entry(0, 0, Some((0, 0, 0))), entry(0, 3, None)], &sources())
            .unwrap();
        assert_eq!(doc.mappings, "AAAA,G");
    }

    #[test]
    fn test_out_of_order_input_fails() {
        let err = MapEncoder::new("out.js")
            .encode(vec![entry(1, 0, None), entry(0, 5, None)], &sources())
            .unwrap_err();
        assert!(matches!(err, MapError::OutOfOrder { .. }));
    }

    #[test]
    fn test_unknown_source_fails() {
        let err = MapEncoder::new("out.js")
            .encode(vec![entry(0, 0, Some((7, 0, 0)))], &sources())
            .unwrap_err();
        assert!(matches!(err, MapError::UnknownSource(SourceId(7))));
    }
}
