//! Source map construction
//!
//! The emitter reports generated positions to a [`PositionTracker`]; once a
//! unit is fully written, the tracker's entries are handed by value to the
//! [`MapEncoder`], which produces a version 3 [`MapDocument`].

mod document;
mod encoder;
mod tracker;
pub mod vlq;

pub use document::{DecodedOriginal, DecodedSegment, MapDocument, MAP_VERSION};
pub use encoder::MapEncoder;
pub use tracker::{GeneratedPos, OriginalPos, PositionEntry, PositionSink, PositionTracker};
