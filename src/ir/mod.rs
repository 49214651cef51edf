//! The SSA-style optimizer IR (`opt-code`): blocks, phi nodes, instructions,
//! calls, inline-assembly nodes, and per-function debug info (spec.md §3,
//! C3). Mirrors the module layout of `cranelift-codegen/src/ir/*`.

pub mod block;
pub mod call;
pub mod code;
pub mod entities;
pub mod function;
pub mod inline_asm;
pub mod instr;
pub mod module;
pub mod opcode;
pub mod operand;
pub mod phi;

pub use block::Block;
pub use call::Call;
pub use code::{CodeContainer, LivenessIndex};
pub use entities::{
    BlockId, CallId, DataId, FunctionDeclarationId, FunctionId, InlineAsmId, InstrId, PhiId, StringLiteralId, SymbolId, TypeId,
};
pub use function::{Function, FunctionDebugInfo};
pub use inline_asm::{InlineAsm, InlineAsmParameter};
pub use instr::Instruction;
pub use module::{
    DataObject, FunctionDeclaration, Module, StringLiteral, Symbol, SymbolKind, SymbolScope, SymbolVisibility, TypeEntry,
};
pub use opcode::Opcode;
pub use operand::{
    AtomicOp, Bitfield, Branch, Comparison, ConditionVariant, FunctionCall, Immediate, MemoryAccess, MemoryOrder, Operand,
    RefList, StackAllocation, StringElementType, Variable,
};
pub use phi::Phi;
