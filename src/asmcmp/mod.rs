//! The asmcmp IR (spec.md §4.6, C8): the linear, near-machine instruction
//! stream consumed by the assembly emitter — a portable abstraction over
//! x86-64 instruction operands, built on the same dense-id / `DenseTable`
//! discipline as the optimizer IR in [`crate::ir`].

pub mod context;
pub mod entities;
pub mod inline_asm;
pub mod instr;
pub mod label;
pub mod operand;
pub mod stash;
pub mod vreg;

pub use context::AsmcmpContext;
pub use entities::{AsmInlineAsmId, AsmInstrId, LabelId, StashId, VRegId};
pub use inline_asm::{AsmInlineAsm, AsmInlineAsmFragment};
pub use instr::{AsmInstruction, AsmOpcode};
pub use label::Label;
pub use operand::{
    Indirect, IndirectBasis, Operand, PhysReg, RelocationKind, RipRelative, SegmentRegister, VRegWidth, X87Index,
};
pub use stash::Stash;
pub use vreg::{VReg, VRegKind};
