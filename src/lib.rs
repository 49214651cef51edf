//! `kefir-core`: the optimizer IR, analysis, scheduling, register
//! allocation and asmcmp core of a C17/C23 compiler middle/back end
//! (spec.md §1-§2).
//!
//! This crate is deliberately scoped to the middle/back end: the
//! preprocessor, lexer, parser, AST, AST→IR lowering, driver/CLI, target
//! metadata and concrete assembly emission are external collaborators
//! (spec.md §1). The boundary contracts this crate exposes are named in
//! spec.md §6: an [`ir::Module`] consumer builds a module by calling the
//! container's `new_*` functions; a back end consumes [`asmcmp`] output.
//!
//! Module layout (spec.md §2's component table):
//!
//! | Component | Module |
//! |---|---|
//! | C1 Arena + string pool | [`string_pool`] |
//! | C2 Associative containers | [`containers`] |
//! | C3 Optimizer IR container | [`ir`] |
//! | C4-C5 Code structure + liveness analysis | [`analysis`] |
//! | C6 Instruction scheduler | [`schedule`] |
//! | C7 Virtual-register allocators | [`regalloc`] |
//! | C8 Asmcmp IR | [`asmcmp`] |
//! | C9 Debug / source maps | [`debuginfo`] |
//! | C10 Tokens & cursor | [`token`] |
//! | C11 Pipeline glue | [`pipeline`] |

pub mod analysis;
pub mod asmcmp;
pub mod containers;
pub mod debuginfo;
pub mod error;
pub mod ir;
pub mod pipeline;
pub mod regalloc;
pub mod schedule;
pub mod string_pool;
pub mod token;

pub use error::{Error, Result, SourceLocation};
