//! The map document and its decoder

use super::tracker::GeneratedPos;
use super::vlq;
use crate::compiler::error::MapError;
use serde::{Deserialize, Serialize};

/// Map format version written into every document
pub const MAP_VERSION: u32 = 3;

/// Terminal output of the encoder; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDocument {
    pub version: u32,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    pub names: Vec<String>,
    pub mappings: String,
}

/// Absolute original position of a decoded segment (indices into the document)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedOriginal {
    pub source_index: u32,
    pub line: u32,
    pub column: u32,
    pub name_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedSegment {
    pub generated: GeneratedPos,
    pub original: Option<DecodedOriginal>,
}

fn apply_delta(base: i64, delta: i64, segment: &str) -> Result<i64, MapError> {
    let value = base + delta;
    if value < 0 || value > u32::MAX as i64 {
        return Err(MapError::InvalidVlq {
            segment: segment.to_string(),
        });
    }
    Ok(value)
}

impl MapDocument {
    pub fn to_json(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Expand the delta-encoded mappings back into absolute positions,
    /// in document order.
    pub fn decode(&self) -> Result<Vec<DecodedSegment>, MapError> {
        let mut segments = Vec::new();
        let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);

        for (gen_line, group) in self.mappings.split(';').enumerate() {
            let mut gen_column = 0i64;
            for text in group.split(',').filter(|s| !s.is_empty()) {
                let fields = vlq::decode(text).ok_or_else(|| MapError::InvalidVlq {
                    segment: text.to_string(),
                })?;
                gen_column = apply_delta(gen_column, fields[0], text)?;
                let generated = GeneratedPos::new(gen_line as u32, gen_column as u32);

                let original = match fields.len() {
                    1 => None,
                    4 | 5 => {
                        source = apply_delta(source, fields[1], text)?;
                        line = apply_delta(line, fields[2], text)?;
                        column = apply_delta(column, fields[3], text)?;
                        let name_index = match fields.get(4) {
                            Some(delta) => {
                                name = apply_delta(name, *delta, text)?;
                                Some(name as u32)
                            }
                            None => None,
                        };
                        Some(DecodedOriginal {
                            source_index: source as u32,
                            line: line as u32,
                            column: column as u32,
                            name_index,
                        })
                    }
                    _ => {
                        return Err(MapError::InvalidVlq {
                            segment: text.to_string(),
                        })
                    }
                };
                segments.push(DecodedSegment {
                    generated,
                    original,
                });
            }
        }
        Ok(segments)
    }

    /// The segment covering a generated position: the last one on `line`
    /// starting at or before `column`.
    pub fn lookup(&self, line: u32, column: u32) -> Result<Option<DecodedSegment>, MapError> {
        Ok(self
            .decode()?
            .into_iter()
            .filter(|s| s.generated.line == line && s.generated.column <= column)
            .last())
    }

    pub fn source_path(&self, index: u32) -> Option<&str> {
        self.sources.get(index as usize).map(String::as_str)
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }
}
