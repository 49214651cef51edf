//! Code analysis layer (spec.md §4.2-§4.3, C4-C5): structural analysis
//! (dominators, predecessors/successors, reachability) and liveness.

pub mod liveness;
pub mod structure;
pub mod use_def;

pub use liveness::CodeLiveness;
pub use structure::CodeStructure;
pub use use_def::verify_use_def;
