//! Debug and source-map support (spec.md §4.7, C9).
//!
//! Two independent facilities share this module: a `SourceMap` (an interval
//! tree keyed by index, used both by the optimizer IR's per-instruction map
//! and by asmcmp's per-instruction-index map), and the module-wide
//! DWARF-like `DebugEntryTree` consumed by an external debug-info emitter.

pub mod entry;
pub mod source_map;

pub use entry::{DebugAttributeTag, DebugAttributeValue, DebugEntry, DebugEntryId, DebugEntryTag, DebugEntryTree};
pub use source_map::{DebugSourceRun, SourceMap};

use crate::error::SourceLocation;

/// Convenience re-export so callers don't need `crate::error::SourceLocation`
/// for a debug-info concern.
pub type Location = SourceLocation;
