//! Compiler configuration
//!
//! Options are plain data with defaults for every field, so a configuration
//! file only has to name what it changes:
//!
//! ```toml
//! runtime_prefix = "$rt"
//! indent_width = 2
//! batch_workers = 4
//!
//! [source_map]
//! embed_sources = true
//! source_root = "/src"
//! ```

use crate::compiler::error::CompileError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options controlling compilation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Identifier of the target runtime helper object
    pub runtime_prefix: String,
    /// Spaces per indentation level in generated text
    pub indent_width: usize,
    /// Worker threads for batch compilation; 0 uses one per available core
    pub batch_workers: usize,
    pub source_map: SourceMapOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            runtime_prefix: "$rt".to_string(),
            indent_width: 4,
            batch_workers: 0,
            source_map: SourceMapOptions::default(),
        }
    }
}

/// Options for the map document produced alongside each unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceMapOptions {
    /// Produce a map document at all
    pub enabled: bool,
    /// Generated file name recorded in the map; defaults to the unit name
    pub file: Option<String>,
    pub source_root: Option<String>,
    /// Embed full source text as `sourcesContent`
    pub embed_sources: bool,
}

impl Default for SourceMapOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
            source_root: None,
            embed_sources: false,
        }
    }
}

impl CompileOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, CompileError> {
        let options: CompileOptions = toml::from_str(text).map_err(|e| CompileError::Config {
            message: e.to_string(),
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CompileError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        let prefix = &self.runtime_prefix;
        let valid_identifier = prefix
            .chars()
            .next()
            .is_some_and(|c| c == '$' || c == '_' || c.is_ascii_alphabetic())
            && prefix
                .chars()
                .all(|c| c == '$' || c == '_' || c.is_ascii_alphanumeric());
        if !valid_identifier {
            return Err(CompileError::Config {
                message: format!("runtime_prefix '{}' is not an identifier", prefix),
            });
        }
        if self.indent_width > 16 {
            return Err(CompileError::Config {
                message: format!("indent_width {} is out of range (0..=16)", self.indent_width),
            });
        }
        Ok(())
    }
}
