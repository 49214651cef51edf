//! Pipeline glue (spec.md §4.9, C11): pass registration, the dead-code
//! elimination pass, and a structured-text formatter for tests and
//! `--print-opt`. These observe or mutate a [`crate::ir::Module`] but don't
//! belong to any single analysis/IR component on their own — mirrors
//! `cranelift-codegen`'s `cfg_printer.rs`/`verifier`/pass-manager split,
//! where the IR containers stay ignorant of what runs over them.

pub mod dce;
pub mod formatter;
pub mod pass;

pub use dce::DeadCodeElimination;
pub use formatter::{format_function, FormatConfig};
pub use pass::{Pass, PassConfig, PassRegistry};
